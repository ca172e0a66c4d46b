mod common;

use breach_filters_rs::{
    AmqFilter, FileKeySource, FilterError, FuseFilter, KeySource,
    MAGIC_KEYS, count_keys, write_keys_file, write_synthetic_keys,
};
use common::test_utils::{TestFile, distinct_keys, init_tracing};
use rand::{SeedableRng, rngs::SmallRng};
use std::fs::OpenOptions;
use std::io::Write;

#[test]
fn test_synthetic_file_round_trip() {
    let file = TestFile::new("keys_synthetic");
    let mut rng = SmallRng::seed_from_u64(1);
    write_synthetic_keys(file.path(), 1_000, &mut rng).unwrap();

    assert_eq!(count_keys(file.path()).unwrap(), 1_000);

    let mut source = FileKeySource::open(file.path()).unwrap();
    assert_eq!(source.count(), 1_000);
    let mut read = 0;
    while source.next_key().unwrap().is_some() {
        read += 1;
    }
    assert_eq!(read, 1_000);
    assert!(source.next_key().unwrap().is_none(), "stream stays exhausted");

    source.rewind().unwrap();
    assert!(
        source.next_key().unwrap().is_some(),
        "rewind must restart the stream"
    );
}

#[test]
fn test_explicit_keys_preserve_order_and_values() {
    let file = TestFile::new("keys_explicit");
    let keys = distinct_keys(257, 2);
    write_keys_file(file.path(), &keys).unwrap();

    let mut source = FileKeySource::open(file.path()).unwrap();
    for expected in &keys {
        assert_eq!(source.next_key().unwrap().as_ref(), Some(expected));
    }
    assert!(source.next_key().unwrap().is_none());
}

#[test]
fn test_bad_magic_is_rejected() {
    let file = TestFile::new("keys_bad_magic");
    std::fs::write(file.path(), b"$not-the-keys-magic\n\0padpadpadpad")
        .unwrap();
    let err = FileKeySource::open(file.path())
        .expect_err("wrong magic must fail closed");
    assert!(matches!(err, FilterError::BadMagic { expected } if expected == MAGIC_KEYS));
}

#[test]
fn test_trailing_partial_record_is_ignored() {
    let file = TestFile::new("keys_partial_record");
    let keys = distinct_keys(10, 3);
    write_keys_file(file.path(), &keys).unwrap();
    let mut handle = OpenOptions::new().append(true).open(file.path()).unwrap();
    handle.write_all(&[0xab; 7]).unwrap();

    assert_eq!(count_keys(file.path()).unwrap(), 10);
    let source = FileKeySource::open(file.path()).unwrap();
    assert_eq!(source.count(), 10);
}

#[test]
fn test_count_keys_missing_file() {
    assert!(matches!(
        count_keys("no_such_keys_file.bin"),
        Err(FilterError::Io(_))
    ));
}

#[test]
fn test_build_from_key_file_end_to_end() {
    init_tracing();
    let keys_file = TestFile::new("keys_end_to_end");
    let keys = distinct_keys(2_000, 4);
    write_keys_file(keys_file.path(), &keys).unwrap();

    let mut source = FileKeySource::open(keys_file.path()).unwrap();
    let mut rng = SmallRng::seed_from_u64(5);
    let filter = FuseFilter::build(&mut source, None, &mut rng)
        .expect("build from a key file should succeed");

    assert!(
        filter.sanity_check(&mut source, None).unwrap(),
        "every key from the file must query true"
    );
    for key in keys.iter().take(100) {
        assert!(filter.contains_key(key));
    }
}
