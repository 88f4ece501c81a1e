//! Text transforms applied to exported module files.
//!
//! An exported module file starts with a metadata region: the `VERSION`
//! declaration, the `BEGIN`/`END` block with its `MultiUse` property, and
//! `Attribute` lines. When a document-bound module is written back, that
//! region is stripped and only the code body is inserted into the host. The
//! region ends permanently at the first line that matches none of the
//! boilerplate prefixes; later lines are kept verbatim even when they happen
//! to look like boilerplate.

/// Line separator used for code bodies handed to the host.
///
/// The host platform is fixed, so this is a constant rather than the
/// process platform's separator.
pub const HOST_LINE_SEPARATOR: &str = "\r\n";

/// The single declaration line that makes a module not worth exporting on
/// its own.
pub const DECLARATION_ONLY_LINE: &str = "Option Explicit";

/// Whether a module body carries nothing worth exporting: no lines at all,
/// or only the bare declaration line.
pub fn is_boilerplate_only(source: &str) -> bool {
    let trimmed = source.trim();
    trimmed.is_empty() || trimmed == DECLARATION_ONLY_LINE
}

/// Drop the leading metadata region from an exported module file's lines.
///
/// Blank lines inside the region are dropped with it. The first non-blank
/// line that is not boilerplate ends the region for good; it and every line
/// after it are kept unchanged.
pub fn strip_metadata_region<'a, I>(lines: I) -> Vec<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut kept = Vec::new();
    let mut in_metadata = true;
    for line in lines {
        if in_metadata {
            if line.trim().is_empty() {
                continue;
            }
            if is_metadata_line(line) {
                continue;
            }
            in_metadata = false;
        }
        kept.push(line);
    }
    kept
}

fn is_metadata_line(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("VERSION ")
        || trimmed == "BEGIN"
        || trimmed.starts_with("BEGIN ")
        || trimmed.starts_with("MultiUse")
        || trimmed == "END"
        || trimmed.starts_with("Attribute ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_strips_full_class_header() {
        let exported = [
            "VERSION 1.0 CLASS",
            "BEGIN",
            "  MultiUse = -1  'True",
            "END",
            "Attribute VB_Name = \"Sheet1\"",
            "Attribute VB_GlobalNameSpace = False",
            "Sub Worksheet_Activate()",
            "End Sub",
        ];
        let body = strip_metadata_region(exported);
        assert_eq!(body, vec!["Sub Worksheet_Activate()", "End Sub"]);
    }

    #[test]
    fn test_region_ends_permanently() {
        // The Attribute-looking line inside the body must survive
        let exported = [
            "Attribute VB_Name = \"ThisWorkbook\"",
            "Sub Setup()",
            "Attribute VB_Description = \"not really an attribute here\"",
            "End Sub",
        ];
        let body = strip_metadata_region(exported);
        assert_eq!(
            body,
            vec![
                "Sub Setup()",
                "Attribute VB_Description = \"not really an attribute here\"",
                "End Sub",
            ]
        );
    }

    #[test]
    fn test_blank_lines_in_region_are_dropped() {
        let exported = ["VERSION 1.0 CLASS", "", "Attribute VB_Name = \"A\"", "", "Dim x"];
        let body = strip_metadata_region(exported);
        assert_eq!(body, vec!["Dim x"]);
    }

    #[test]
    fn test_blank_lines_in_body_are_kept() {
        let exported = ["Attribute VB_Name = \"A\"", "Dim x", "", "Dim y"];
        let body = strip_metadata_region(exported);
        assert_eq!(body, vec!["Dim x", "", "Dim y"]);
    }

    #[test]
    fn test_end_sub_is_not_an_end_marker() {
        let exported = ["Attribute VB_Name = \"A\"", "End Sub"];
        let body = strip_metadata_region(exported);
        assert_eq!(body, vec!["End Sub"]);
    }

    #[test]
    fn test_all_metadata_yields_empty_body() {
        let exported = ["VERSION 1.0 CLASS", "BEGIN", "END", "Attribute VB_Name = \"A\""];
        assert!(strip_metadata_region(exported).is_empty());
    }

    #[test]
    fn test_boilerplate_only_detection() {
        assert!(is_boilerplate_only(""));
        assert!(is_boilerplate_only("   \r\n"));
        assert!(is_boilerplate_only("Option Explicit"));
        assert!(is_boilerplate_only("Option Explicit\r\n"));
        assert!(!is_boilerplate_only("Option Explicit\r\nSub A()\r\nEnd Sub"));
        assert!(!is_boilerplate_only("Sub A()\r\nEnd Sub"));
    }

    fn header_line() -> impl Strategy<Value = &'static str> {
        prop_oneof![
            Just("VERSION 1.0 CLASS"),
            Just("BEGIN"),
            Just("  MultiUse = -1  'True"),
            Just("END"),
            Just("Attribute VB_Name = \"Module1\""),
            Just("Attribute VB_Exposed = False"),
            Just(""),
        ]
    }

    fn body_line() -> impl Strategy<Value = &'static str> {
        prop_oneof![
            Just("Sub Main()"),
            Just("    Call Helper"),
            Just("End Sub"),
            Just(""),
            Just("Attribute VB_Name = \"Impostor\""),
            Just("END"),
            Just("' comment"),
        ]
    }

    fn body_opener() -> impl Strategy<Value = &'static str> {
        prop_oneof![Just("Sub Main()"), Just("Dim x As Long"), Just("' notes")]
    }

    proptest! {
        #[test]
        fn prop_body_survives_any_header(
            header in proptest::collection::vec(header_line(), 0..8),
            opener in body_opener(),
            rest in proptest::collection::vec(body_line(), 0..8),
        ) {
            let mut lines = header;
            lines.push(opener);
            lines.extend(rest.iter().copied());

            let mut expected = vec![opener];
            expected.extend(rest);

            prop_assert_eq!(strip_metadata_region(lines), expected);
        }

        #[test]
        fn prop_stripping_is_idempotent(
            lines in proptest::collection::vec(
                prop_oneof![header_line(), body_line()], 0..16),
        ) {
            let once = strip_metadata_region(lines);
            let twice = strip_metadata_region(once.clone());
            prop_assert_eq!(once, twice);
        }
    }
}
