//! Extraction of real-shaped export files

use std::path::PathBuf;
use std::sync::Arc;
use waylon_common::types::{MetadataEntry, CANVAS_LABEL_FIELD_FLAG, VIEWING_MODE_FLAG};
use waylon_server::extract::{ExtractError, TabularExtractor};
use waylon_server::formats::FormatTable;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn extractor() -> TabularExtractor {
    TabularExtractor::new(Arc::new(FormatTable::builtin().unwrap()), 1)
}

#[test]
fn test_library_fixture() {
    let work = extractor()
        .extract_path("lib_b1234.tsv", &fixture("lib_b1234.tsv"))
        .unwrap();

    assert_eq!(work.id, "b1234");
    assert_eq!(work.label, "The Veterinarian, Vol. 1");
    assert_eq!(work.format.as_deref(), Some("library"));

    // Chapter, Issue and General Note are absent from this export
    assert_eq!(work.work_metadata.len(), 10);
    assert_eq!(work.work_metadata[0], MetadataEntry::new("Work Title", "The Veterinarian, Vol. 1"));
    assert!(work.work_metadata.iter().all(|e| !e.value.trim().is_empty()));

    // The blank row between pages 4 and 5 is not a page
    let origins: Vec<_> = work.image_collection.iter().map(|i| i.origin.as_str()).collect();
    assert_eq!(
        origins,
        vec!["b1234_001.jpg", "b1234_002.jpg", "b1234_003.jpg", "b1234_004.jpg", "b1234_005.jpg"]
    );
    for (position, image) in work.image_collection.iter().enumerate() {
        assert_eq!(image.ordinal, position);
        assert_eq!(image.work_key, "b1234");
    }

    let titles: Vec<_> = work.toc.keys().map(String::as_str).collect();
    assert_eq!(titles, vec!["Preface", "On Glanders", "Notices"]);
    assert_eq!(work.toc["Preface"], vec![1]);
    assert_eq!(work.toc["On Glanders"], vec![2, 3]);
    assert_eq!(work.toc["Notices"], vec![3, 4]);

    assert_eq!(work.flags[VIEWING_MODE_FLAG], "2");
    assert_eq!(work.flags[CANVAS_LABEL_FIELD_FLAG], "Page");
    assert_eq!(work.image_metadata[&0], vec![MetadataEntry::new("Page", "i")]);
    assert_eq!(
        work.image_metadata[&2],
        vec![
            MetadataEntry::new("Page", "1"),
            MetadataEntry::new("Article", "On Glanders"),
            MetadataEntry::new("Author", "John Field"),
            MetadataEntry::new("Subject", "Glanders"),
        ]
    );
}

#[test]
fn test_archive_fixture() {
    let work = extractor()
        .extract_path("arc_RCVS_Box4.tsv", &fixture("arc_RCVS_Box4.tsv"))
        .unwrap();

    assert_eq!(work.id, "RCVS_Box4");
    assert_eq!(work.label, "Correspondence, Box 4");
    assert_eq!(work.format.as_deref(), Some("archive"));
    assert_eq!(work.work_metadata.len(), 8);
    assert_eq!(work.work_metadata[0], MetadataEntry::new("Catalogue ref", "RCVS/B/4"));

    assert_eq!(work.image_collection.len(), 2);
    assert_eq!(work.toc["Letters"], vec![0, 1]);
    assert_eq!(work.flags[VIEWING_MODE_FLAG], "1");
    assert!(!work.flags.contains_key(CANVAS_LABEL_FIELD_FLAG));

    assert_eq!(
        work.image_metadata[&1],
        vec![
            MetadataEntry::new("Catalogue ref", "RCVS/B/4/2"),
            MetadataEntry::new("Title", "Reply"),
            MetadataEntry::new("Date", "1881"),
            MetadataEntry::new("Format", "Manuscript"),
        ]
    );
}

#[test]
fn test_record_projection_drops_images() {
    let work = extractor()
        .extract_path("lib_b1234.tsv", &fixture("lib_b1234.tsv"))
        .unwrap();
    let record = work.to_record();

    assert_eq!(record.id.as_deref(), Some("b1234"));
    assert_eq!(record.meta, work.work_metadata);
    assert_eq!(record.toc, work.toc);
    assert_eq!(record.image_metadata.len(), 5);
    assert_eq!(record.canvas_label_field(), Some("Page"));
}

#[test]
fn test_format_from_configuration() {
    let table = FormatTable::parse(
        r#"
[decoration]
logo = "https://example.org/logo.png"

[[formats]]
name = "parish"
prefix = "par"
id_prefix_len = 7
title_column = "Register"
filename_column = "Image"
contents_column = "Section"
contents_delimiter = ";"
origin_prefix = "s3://parish-images/"
work_columns = ["Register", "Parish"]
page_columns = ["Folio"]
"#,
    )
    .unwrap();

    let data = "Register\tParish\tImage\tFolio\tSection\n\
                Baptisms 1801\tSt Giles\t\t\t\n\
                \t\tf1.tif\t1r\tBaptisms; Index\n";

    let work = TabularExtractor::new(Arc::new(table), 4)
        .extract("parish_g42.txt", data.as_bytes())
        .unwrap();

    assert_eq!(work.id, "g42");
    assert_eq!(work.format.as_deref(), Some("parish"));
    assert_eq!(work.image_collection[0].origin, "s3://parish-images/f1.tif");
    assert_eq!(work.image_collection[0].space, 4);
    assert_eq!(work.toc.keys().collect::<Vec<_>>(), vec!["Baptisms", "Index"]);
    assert!(work.flags.is_empty());
}

#[test]
fn test_missing_file() {
    let err = extractor()
        .extract_path("lib_none.tsv", &fixture("does_not_exist.tsv"))
        .unwrap_err();
    assert!(matches!(err, ExtractError::Io(_)));
}
