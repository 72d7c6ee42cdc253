use docraster::{
    pages::{resolve, MAX_PAGE},
    PageSpec, RasterError,
};

#[test]
fn null_spec_selects_every_page() {
    let pages = resolve(None, 5).unwrap();
    assert_eq!(pages.as_slice(), &[1, 2, 3, 4, 5]);
}

#[test]
fn union_is_sorted_and_deduplicated() {
    assert_eq!(resolve(Some("3,1-2"), 0).unwrap().as_slice(), &[1, 2, 3]);
    assert_eq!(
        resolve(Some("5,2-4,3,1-2"), 0).unwrap().as_slice(),
        &[1, 2, 3, 4, 5]
    );
}

#[test]
fn open_ended_range_runs_to_last_page() {
    let spec = PageSpec::parse("1-3,5,9-").unwrap();
    assert!(spec.is_open_ended());
    assert_eq!(spec.resolve(11).as_slice(), &[1, 2, 3, 5, 9, 10, 11]);
    assert!(!PageSpec::parse("1-3,5").unwrap().is_open_ended());
}

#[test]
fn whitespace_and_empty_tokens_are_tolerated() {
    assert_eq!(resolve(Some(" 2 , 4-5 ,"), 0).unwrap().as_slice(), &[2, 4, 5]);
}

#[test]
fn reversed_range_is_empty() {
    assert!(resolve(Some("5-3"), 10).unwrap().is_empty());
}

#[test]
fn malformed_tokens_fail() {
    for bad in ["a", "1-b", "0", "-3", "1-2-3", "2.5"] {
        match resolve(Some(bad), 10) {
            Err(RasterError::InvalidPageSpec { spec, .. }) => assert_eq!(spec, bad),
            other => panic!("{bad}: expected InvalidPageSpec, got {other:?}"),
        }
    }
}

#[test]
fn page_numbers_above_the_limit_fail_before_expansion() {
    for bad in ["1-4294967295", "4294967295", "100001", "99999-100001", "100001-"] {
        match resolve(Some(bad), 0) {
            Err(RasterError::InvalidPageSpec { spec, .. }) => assert_eq!(spec, bad),
            other => panic!("{bad}: expected InvalidPageSpec, got {other:?}"),
        }
    }
    let last = MAX_PAGE.to_string();
    assert_eq!(resolve(Some(&last), 0).unwrap().as_slice(), &[MAX_PAGE]);
    assert_eq!(
        resolve(Some("99999-100000"), 0).unwrap().as_slice(),
        &[99_999, 100_000]
    );
}
