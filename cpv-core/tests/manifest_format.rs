use cpv_core::diff::{diff, diff_files};
use cpv_core::manifest::{LineSyntax, Manifest, ManifestEntry};
use cpv_core::CpvError;
use proptest::prelude::*;
use std::fs;
use std::path::Path;

fn path_char() -> impl Strategy<Value = char> {
    prop_oneof![
        Just(' '),
        Just('*'),
        Just('\\'),
        Just('\r'),
        Just('\n'),
        Just('/'),
        Just(';'),
        Just('.'),
        any::<char>(),
    ]
}

fn any_path() -> impl Strategy<Value = String> {
    prop::collection::vec(path_char(), 1..24).prop_map(|cs| cs.into_iter().collect())
}

proptest! {
    #[test]
    fn serialize_then_parse_is_identity(checksum in "[0-9a-f]{64}", path in any_path()) {
        let e = ManifestEntry::new(checksum, path);
        let line = e.to_string();
        prop_assert!(!line.contains('\n'));
        let back = ManifestEntry::parse_line(&line).unwrap();
        prop_assert_eq!(back, e);
    }

    #[test]
    fn manifest_text_round_trips(
        entries in prop::collection::vec(("[0-9a-f]{64}", any_path()), 1..8),
    ) {
        let mf = Manifest {
            entries: entries.into_iter().map(|(c, p)| ManifestEntry::new(c, p)).collect(),
        };
        let text: String = mf.entries.iter().map(|e| format!("{e}\n")).collect();
        prop_assert_eq!(Manifest::parse(&text, Path::new("m.txt")).unwrap(), mf);
    }

    #[test]
    fn diff_of_a_permutation_is_empty(sums in prop::collection::vec("[0-9a-f]{64}", 1..20)) {
        let a = Manifest {
            entries: sums
                .iter()
                .enumerate()
                .map(|(i, s)| ManifestEntry::new(s.clone(), format!("f{i}")))
                .collect(),
        };
        let mut shuffled = a.clone();
        shuffled.entries.reverse();
        prop_assert!(diff(&a, &shuffled).is_empty());
        prop_assert!(diff(&shuffled, &a).is_empty());
    }
}

#[test]
fn manifest_file_round_trip() {
    let td = tempfile::tempdir().unwrap();
    let p = td.path().join("m.txt");
    let mf = Manifest {
        entries: vec![
            ManifestEntry::new("0".repeat(64), "dir/a file.txt"),
            ManifestEntry::new("f".repeat(64), "b.txt"),
        ],
    };
    mf.write(&p).unwrap();
    assert_eq!(
        fs::read_to_string(&p).unwrap(),
        format!("{} dir/a file.txt\n{} b.txt\n", "0".repeat(64), "f".repeat(64))
    );
    assert_eq!(Manifest::read(&p).unwrap(), mf);
}

#[test]
fn diff_files_writes_report_and_keeps_inputs() {
    let td = tempfile::tempdir().unwrap();
    let a = td.path().join("a.txt");
    let b = td.path().join("b.txt");
    let out = td.path().join("out.txt");
    let line1 = format!("{} x", "1".repeat(64));
    let line2 = format!("{} y", "2".repeat(64));
    fs::write(&a, format!("{line2}\n{line1}\n")).unwrap();
    fs::write(&b, format!("{line1}\n")).unwrap();

    let d = diff_files(&a, &b, &out, LineSyntax::Native).unwrap();
    assert_eq!(d.len(), 1);
    assert_eq!(fs::read_to_string(&out).unwrap(), format!("{line2}\n"));
    assert_eq!(fs::read_to_string(&a).unwrap(), format!("{line2}\n{line1}\n"));

    let d = diff_files(&b, &a, &out, LineSyntax::Native).unwrap();
    assert!(d.is_empty());
    assert_eq!(fs::read(&out).unwrap(), b"");
}

#[test]
fn diff_files_missing_left_is_an_error_not_empty() {
    let td = tempfile::tempdir().unwrap();
    let b = td.path().join("b.txt");
    fs::write(&b, "").unwrap();
    let out = td.path().join("out.txt");
    let err = diff_files(&td.path().join("absent.txt"), &b, &out, LineSyntax::Native).unwrap_err();
    assert!(matches!(err, CpvError::MissingManifest { .. }));
    assert!(!td.path().join("out.txt").exists());
}

#[test]
fn reads_sha256sum_style_output() {
    let text =
        format!("{}  ./photos/img 1.jpg\n{} *docs\\readme.md\n", "A".repeat(64), "b".repeat(64));
    let mf = Manifest::parse_with(&text, Path::new("SHA256SUMS"), LineSyntax::Lenient).unwrap();
    assert_eq!(mf.entries[0], ManifestEntry::new("a".repeat(64), "photos/img 1.jpg"));
    assert_eq!(mf.entries[1], ManifestEntry::new("b".repeat(64), "docs/readme.md"));
}

#[test]
fn native_reading_keeps_a_leading_star_or_space() {
    let text = format!("{} *star.txt\n{}  lead.txt\n", "a".repeat(64), "b".repeat(64));
    let mf = Manifest::parse(&text, Path::new("m.txt")).unwrap();
    assert_eq!(mf.entries[0].path, "*star.txt");
    assert_eq!(mf.entries[1].path, " lead.txt");
}
