//! In-memory simulated host.
//!
//! Implements the full [`HostGateway`]/[`HostHandle`]/[`DocumentHandle`]/
//! [`ModuleHandle`] surface against an in-process world: a process table,
//! application visibility, a library of workbooks, and per-workbook module
//! collections. The simulator models the host quirks the engine has to cope
//! with: workbooks indexed by filename, module files read and written only
//! in the host's native encoding, component kinds derived from import file
//! extensions, and (optionally) an orphaned process left behind after a
//! scripted quit.
//!
//! The setup and inspection methods on [`SimGateway`] are test-harness
//! surface and may panic on misuse (e.g. opening a workbook that was never
//! registered); the trait implementations themselves never panic.

use super::{
    DocumentHandle, DocumentInfo, HostError, HostGateway, HostHandle, ModuleHandle, ModuleKind,
};
use crate::encoding::{self, TextEncoding};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use std::cell::RefCell;
use std::fs;
use std::rc::Rc;

/// One VBA component in a simulated workbook.
#[derive(Debug, Clone)]
pub struct SimModule {
    pub name: String,
    pub kind: ModuleKind,
    /// Sheet or workbook the module is attached to (document-bound only).
    pub bound_object: Option<String>,
    /// Code body, CRLF-joined.
    pub body: String,
}

impl SimModule {
    pub fn standard(name: &str, body: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: ModuleKind::Standard,
            bound_object: None,
            body: body.to_string(),
        }
    }

    pub fn class(name: &str, body: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: ModuleKind::ClassBased,
            bound_object: None,
            body: body.to_string(),
        }
    }

    pub fn document_bound(name: &str, bound_object: &str, body: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: ModuleKind::DocumentBound,
            bound_object: Some(bound_object.to_string()),
            body: body.to_string(),
        }
    }

    pub fn form(name: &str, body: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: ModuleKind::FormBound,
            bound_object: None,
            body: body.to_string(),
        }
    }

    fn line_count(&self) -> usize {
        self.body.lines().count()
    }

    /// The text the host's export call produces for this module.
    fn exported_text(&self) -> String {
        let mut out = String::new();
        match self.kind {
            ModuleKind::Standard => {
                out.push_str(&format!("Attribute VB_Name = \"{}\"\r\n", self.name));
            }
            ModuleKind::ClassBased | ModuleKind::DocumentBound => {
                out.push_str("VERSION 1.0 CLASS\r\n");
                out.push_str("BEGIN\r\n");
                out.push_str("  MultiUse = -1  'True\r\n");
                out.push_str("END\r\n");
                out.push_str(&format!("Attribute VB_Name = \"{}\"\r\n", self.name));
                out.push_str("Attribute VB_GlobalNameSpace = False\r\n");
                out.push_str("Attribute VB_Creatable = False\r\n");
                if self.kind == ModuleKind::DocumentBound {
                    out.push_str("Attribute VB_PredeclaredId = True\r\n");
                    out.push_str("Attribute VB_Exposed = True\r\n");
                } else {
                    out.push_str("Attribute VB_PredeclaredId = False\r\n");
                    out.push_str("Attribute VB_Exposed = False\r\n");
                }
            }
            ModuleKind::FormBound => {
                out.push_str(&format!("VERSION 5.00\r\nBegin {{Form}} {}\r\nEnd\r\n", self.name));
                out.push_str(&format!("Attribute VB_Name = \"{}\"\r\n", self.name));
            }
        }
        if !self.body.is_empty() {
            out.push_str(&self.body);
            out.push_str("\r\n");
        }
        out
    }
}

#[derive(Debug, Clone)]
struct SimWorkbook {
    path: Utf8PathBuf,
    modules: IndexMap<String, SimModule>,
    worksheets: usize,
    external_references: usize,
    open: bool,
    dirty: bool,
    worksheets_released: bool,
    references_released: bool,
}

impl SimWorkbook {
    fn file_name(&self) -> String {
        self.path.file_name().unwrap_or_default().to_string()
    }
}

#[derive(Debug, Default)]
struct SimWorld {
    /// Host processes currently running.
    instances: usize,
    visible: bool,
    /// When set, a scripted quit leaves the process behind (the host quirk
    /// the force-kill pass exists for).
    orphan_on_quit: bool,
    quit_requested: bool,
    /// Cumulative count of processes removed by the force-kill pass.
    kills: usize,
    workbooks: IndexMap<Utf8PathBuf, SimWorkbook>,
}

impl SimWorld {
    fn workbook_mut(&mut self, path: &Utf8Path) -> Result<&mut SimWorkbook, HostError> {
        let name = path.file_name().unwrap_or_default().to_string();
        match self.workbooks.get_mut(path) {
            Some(wb) if wb.open => Ok(wb),
            _ => Err(HostError::DocumentNotOpen(name)),
        }
    }
}

/// Gateway to the simulated host. Cheap to clone; clones share one world.
#[derive(Debug, Clone, Default)]
pub struct SimGateway {
    world: Rc<RefCell<SimWorld>>,
}

impl SimGateway {
    /// A simulator with no running host instance and an empty library.
    pub fn new() -> Self {
        Self::default()
    }

    // ----- setup (test harness) -----

    /// Pretend the user already has one host instance running.
    pub fn set_running(&self, visible: bool) {
        let mut world = self.world.borrow_mut();
        world.instances = 1;
        world.visible = visible;
    }

    /// Set the raw process count (for the multiple-instance precondition).
    pub fn set_instances(&self, count: usize) {
        self.world.borrow_mut().instances = count;
    }

    /// Make a scripted quit leave the process behind.
    pub fn set_orphan_on_quit(&self, orphan: bool) {
        self.world.borrow_mut().orphan_on_quit = orphan;
    }

    /// Register a workbook the host can open from `path`.
    pub fn add_workbook(&self, path: &Utf8Path, modules: Vec<SimModule>) {
        let mut map = IndexMap::new();
        for module in modules {
            map.insert(module.name.clone(), module);
        }
        self.world.borrow_mut().workbooks.insert(
            path.to_path_buf(),
            SimWorkbook {
                path: path.to_path_buf(),
                modules: map,
                worksheets: 3,
                external_references: 1,
                open: false,
                dirty: false,
                worksheets_released: false,
                references_released: false,
            },
        );
    }

    /// Mark a registered workbook as already open in the user's session.
    ///
    /// Panics when the workbook was never registered.
    pub fn open_workbook(&self, path: &Utf8Path) {
        let mut world = self.world.borrow_mut();
        let wb = world
            .workbooks
            .get_mut(path)
            .unwrap_or_else(|| panic!("open_workbook: {path} was never registered"));
        wb.open = true;
    }

    // ----- inspection (test harness) -----

    pub fn instance_count(&self) -> usize {
        self.world.borrow().instances
    }

    pub fn is_running(&self) -> bool {
        self.instance_count() > 0
    }

    pub fn is_visible(&self) -> bool {
        self.world.borrow().visible
    }

    pub fn quit_was_requested(&self) -> bool {
        self.world.borrow().quit_requested
    }

    pub fn kill_count(&self) -> usize {
        self.world.borrow().kills
    }

    pub fn is_open(&self, path: &Utf8Path) -> bool {
        self.world
            .borrow()
            .workbooks
            .get(path)
            .is_some_and(|wb| wb.open)
    }

    pub fn is_dirty(&self, path: &Utf8Path) -> bool {
        self.world
            .borrow()
            .workbooks
            .get(path)
            .is_some_and(|wb| wb.dirty)
    }

    pub fn worksheets_released(&self, path: &Utf8Path) -> bool {
        self.world
            .borrow()
            .workbooks
            .get(path)
            .is_some_and(|wb| wb.worksheets_released)
    }

    pub fn references_released(&self, path: &Utf8Path) -> bool {
        self.world
            .borrow()
            .workbooks
            .get(path)
            .is_some_and(|wb| wb.references_released)
    }

    /// Module names of a registered workbook, in collection order.
    pub fn module_names(&self, path: &Utf8Path) -> Vec<String> {
        self.world
            .borrow()
            .workbooks
            .get(path)
            .map(|wb| wb.modules.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Snapshot of one module of a registered workbook.
    pub fn module(&self, path: &Utf8Path, name: &str) -> Option<SimModule> {
        self.world
            .borrow()
            .workbooks
            .get(path)
            .and_then(|wb| wb.modules.get(name).cloned())
    }
}

impl HostGateway for SimGateway {
    fn running_instances(&self) -> Result<usize, HostError> {
        Ok(self.world.borrow().instances)
    }

    fn attach(&self) -> Result<Option<Box<dyn HostHandle>>, HostError> {
        if self.world.borrow().instances >= 1 {
            Ok(Some(Box::new(SimHostHandle {
                world: Rc::clone(&self.world),
            })))
        } else {
            Ok(None)
        }
    }

    fn launch(&self) -> Result<Box<dyn HostHandle>, HostError> {
        let mut world = self.world.borrow_mut();
        world.instances += 1;
        // A freshly automated instance starts hidden
        world.visible = false;
        drop(world);
        Ok(Box::new(SimHostHandle {
            world: Rc::clone(&self.world),
        }))
    }

    fn kill_stray_instances(&self) -> Result<usize, HostError> {
        let mut world = self.world.borrow_mut();
        let found = world.instances;
        world.instances = 0;
        world.kills += found;
        if found > 0 {
            // Killed processes take their open workbooks with them
            for wb in world.workbooks.values_mut() {
                wb.open = false;
            }
        }
        Ok(found)
    }
}

struct SimHostHandle {
    world: Rc<RefCell<SimWorld>>,
}

impl SimHostHandle {
    fn ensure_running(&self) -> Result<(), HostError> {
        if self.world.borrow().instances == 0 {
            return Err(HostError::Call("no host instance is running".into()));
        }
        Ok(())
    }
}

impl HostHandle for SimHostHandle {
    fn is_visible(&self) -> Result<bool, HostError> {
        self.ensure_running()?;
        Ok(self.world.borrow().visible)
    }

    fn set_visible(&mut self, visible: bool) -> Result<(), HostError> {
        self.ensure_running()?;
        self.world.borrow_mut().visible = visible;
        Ok(())
    }

    fn open_documents(&self) -> Result<Vec<DocumentInfo>, HostError> {
        self.ensure_running()?;
        Ok(self
            .world
            .borrow()
            .workbooks
            .values()
            .filter(|wb| wb.open)
            .map(|wb| DocumentInfo {
                name: wb.file_name(),
                full_path: wb.path.clone(),
            })
            .collect())
    }

    fn bind_document(&self, name: &str) -> Result<Box<dyn DocumentHandle>, HostError> {
        self.ensure_running()?;
        let world = self.world.borrow();
        let wb = world
            .workbooks
            .values()
            .find(|wb| wb.open && wb.file_name().eq_ignore_ascii_case(name))
            .ok_or_else(|| HostError::DocumentNotOpen(name.to_string()))?;
        let path = wb.path.clone();
        drop(world);
        Ok(Box::new(SimDocumentHandle {
            world: Rc::clone(&self.world),
            path,
        }))
    }

    fn open_document(&mut self, path: &Utf8Path) -> Result<Box<dyn DocumentHandle>, HostError> {
        self.ensure_running()?;
        let mut world = self.world.borrow_mut();
        let name = path.file_name().unwrap_or_default().to_string();
        // The host indexes open workbooks by filename and refuses a second
        // one with the same name
        if world
            .workbooks
            .values()
            .any(|wb| wb.open && wb.file_name().eq_ignore_ascii_case(&name) && wb.path != *path)
        {
            return Err(HostError::Call(format!(
                "a workbook named {name} is already open"
            )));
        }
        let wb = world
            .workbooks
            .get_mut(path)
            .ok_or_else(|| HostError::Call(format!("cannot open {path}: no such workbook")))?;
        wb.open = true;
        drop(world);
        Ok(Box::new(SimDocumentHandle {
            world: Rc::clone(&self.world),
            path: path.to_path_buf(),
        }))
    }

    fn quit(&mut self) -> Result<(), HostError> {
        self.ensure_running()?;
        let mut world = self.world.borrow_mut();
        world.quit_requested = true;
        for wb in world.workbooks.values_mut() {
            wb.open = false;
        }
        if !world.orphan_on_quit {
            world.instances = world.instances.saturating_sub(1);
        }
        Ok(())
    }
}

struct SimDocumentHandle {
    world: Rc<RefCell<SimWorld>>,
    path: Utf8PathBuf,
}

impl SimDocumentHandle {
    fn with_workbook<R>(
        &self,
        f: impl FnOnce(&mut SimWorkbook) -> Result<R, HostError>,
    ) -> Result<R, HostError> {
        let mut world = self.world.borrow_mut();
        let wb = world.workbook_mut(&self.path)?;
        f(wb)
    }
}

impl DocumentHandle for SimDocumentHandle {
    fn name(&self) -> Result<String, HostError> {
        Ok(self.path.file_name().unwrap_or_default().to_string())
    }

    fn full_path(&self) -> Result<Utf8PathBuf, HostError> {
        Ok(self.path.clone())
    }

    fn release_worksheets(&mut self) -> Result<usize, HostError> {
        self.with_workbook(|wb| {
            wb.worksheets_released = true;
            Ok(wb.worksheets)
        })
    }

    fn release_external_references(&mut self) -> Result<usize, HostError> {
        self.with_workbook(|wb| {
            wb.references_released = true;
            Ok(wb.external_references)
        })
    }

    fn modules(&self) -> Result<Vec<Box<dyn ModuleHandle>>, HostError> {
        let names = self.with_workbook(|wb| Ok(wb.modules.keys().cloned().collect::<Vec<_>>()))?;
        Ok(names
            .into_iter()
            .map(|name| {
                Box::new(SimModuleHandle {
                    world: Rc::clone(&self.world),
                    path: self.path.clone(),
                    name,
                }) as Box<dyn ModuleHandle>
            })
            .collect())
    }

    fn find_module(&self, name: &str) -> Result<Option<Box<dyn ModuleHandle>>, HostError> {
        let found = self.with_workbook(|wb| {
            Ok(wb
                .modules
                .keys()
                .find(|n| n.eq_ignore_ascii_case(name))
                .cloned())
        })?;
        Ok(found.map(|name| {
            Box::new(SimModuleHandle {
                world: Rc::clone(&self.world),
                path: self.path.clone(),
                name,
            }) as Box<dyn ModuleHandle>
        }))
    }

    fn remove_module(&mut self, name: &str) -> Result<(), HostError> {
        self.with_workbook(|wb| {
            let key = wb
                .modules
                .keys()
                .find(|n| n.eq_ignore_ascii_case(name))
                .cloned()
                .ok_or_else(|| HostError::ModuleNotFound(name.to_string()))?;
            if wb.modules[&key].kind == ModuleKind::DocumentBound {
                return Err(HostError::Call(format!(
                    "cannot remove document-bound module {key}"
                )));
            }
            wb.modules.shift_remove(&key);
            wb.dirty = true;
            Ok(())
        })
    }

    fn import_module(&mut self, path: &Utf8Path) -> Result<(), HostError> {
        let bytes = fs::read(path)?;
        let (text, _, had_errors) = encoding_rs::SHIFT_JIS.decode(&bytes);
        if had_errors {
            return Err(HostError::Call(format!(
                "{path} is not valid {}",
                TextEncoding::host_native().label()
            )));
        }
        let kind = ModuleKind::from_extension(path.extension().unwrap_or_default());
        let fallback = path.file_stem().unwrap_or_default();
        let (name, body) = parse_import(&text, fallback);
        self.with_workbook(|wb| {
            if wb.modules.keys().any(|n| n.eq_ignore_ascii_case(&name)) {
                return Err(HostError::Call(format!("module {name} already exists")));
            }
            wb.modules.insert(
                name.clone(),
                SimModule {
                    name: name.clone(),
                    kind,
                    bound_object: None,
                    body,
                },
            );
            wb.dirty = true;
            Ok(())
        })
    }

    fn save(&mut self) -> Result<(), HostError> {
        self.with_workbook(|wb| {
            wb.dirty = false;
            Ok(())
        })
    }

    fn close(&mut self, _save_changes: bool) -> Result<(), HostError> {
        self.with_workbook(|wb| {
            wb.open = false;
            Ok(())
        })
    }
}

struct SimModuleHandle {
    world: Rc<RefCell<SimWorld>>,
    path: Utf8PathBuf,
    name: String,
}

impl SimModuleHandle {
    fn with_module<R>(
        &self,
        f: impl FnOnce(&mut SimModule) -> Result<R, HostError>,
    ) -> Result<R, HostError> {
        let mut world = self.world.borrow_mut();
        let wb = world.workbook_mut(&self.path)?;
        let module = wb
            .modules
            .get_mut(&self.name)
            .ok_or_else(|| HostError::ModuleNotFound(self.name.clone()))?;
        f(module)
    }

    fn mark_dirty(&self) -> Result<(), HostError> {
        let mut world = self.world.borrow_mut();
        let wb = world.workbook_mut(&self.path)?;
        wb.dirty = true;
        Ok(())
    }
}

impl ModuleHandle for SimModuleHandle {
    fn name(&self) -> Result<String, HostError> {
        Ok(self.name.clone())
    }

    fn kind(&self) -> Result<ModuleKind, HostError> {
        self.with_module(|m| Ok(m.kind))
    }

    fn line_count(&self) -> Result<usize, HostError> {
        self.with_module(|m| Ok(m.line_count()))
    }

    fn source_text(&self) -> Result<String, HostError> {
        self.with_module(|m| Ok(m.body.clone()))
    }

    fn bound_object_name(&self) -> Result<Option<String>, HostError> {
        self.with_module(|m| Ok(m.bound_object.clone()))
    }

    fn export(&self, path: &Utf8Path) -> Result<(), HostError> {
        let text = self.with_module(|m| Ok(m.exported_text()))?;
        encoding::write_string(path, &text, TextEncoding::host_native())
            .map_err(|e| HostError::Call(e.to_string()))
    }

    fn replace_body(&mut self, body: &str) -> Result<(), HostError> {
        self.with_module(|m| {
            m.body = body.to_string();
            Ok(())
        })?;
        self.mark_dirty()
    }
}

/// Parse an import file the way the host does: the `VB_Name` attribute names
/// the component, header lines are consumed, everything after the header is
/// the code body.
fn parse_import(text: &str, fallback_name: &str) -> (String, String) {
    let mut name = None;
    let mut body_lines = Vec::new();
    let mut in_header = true;
    for line in text.lines() {
        if in_header {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if let Some(rest) = trimmed.strip_prefix("Attribute VB_Name = ") {
                name = Some(rest.trim().trim_matches('"').to_string());
                continue;
            }
            if trimmed.starts_with("VERSION")
                || trimmed == "BEGIN"
                || trimmed.starts_with("Begin ")
                || trimmed.starts_with("MultiUse")
                || trimmed == "END"
                || trimmed == "End"
                || trimmed.starts_with("Attribute ")
            {
                continue;
            }
            in_header = false;
        }
        body_lines.push(line);
    }
    (
        name.unwrap_or_else(|| fallback_name.to_string()),
        body_lines.join("\r\n"),
    )
}
