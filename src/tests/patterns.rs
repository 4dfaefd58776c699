//! Pattern key comparison: total, deterministic, descending specificity.

use std::cmp::Ordering;

use crate::{FileSystemOs, ResolverGeneric};

fn compare(a: &str, b: &str) -> Ordering {
    ResolverGeneric::<FileSystemOs>::pattern_key_compare(a, b)
}

#[test]
fn no_best_match_yet_always_loses() {
    assert_eq!(compare("", "./a/*"), Ordering::Greater);
    assert_eq!(compare("", "./a/"), Ordering::Greater);
}

#[test]
fn longer_base_is_more_specific() {
    assert_eq!(compare("./a/*", "./abc/*"), Ordering::Greater);
    assert_eq!(compare("./abc/*", "./a/*"), Ordering::Less);
}

#[test]
fn base_ties_break_on_total_length() {
    assert_eq!(compare("./a/*", "./a/*.js"), Ordering::Greater);
    assert_eq!(compare("./a/*.js", "./a/*"), Ordering::Less);
}

#[test]
fn folder_keys_compare_by_full_length() {
    // A folder key has no `*`, its whole length is the base.
    assert_eq!(compare("./dist/", "./dist/x*"), Ordering::Greater);
    assert_eq!(compare("./dist/sub/", "./d*"), Ordering::Less);
}

#[test]
fn equal_keys_are_equal() {
    assert_eq!(compare("./a/*", "./a/*"), Ordering::Equal);
}

#[test]
fn antisymmetric() {
    let keys = ["./a/*", "./a/*.js", "./ab/*", "./abc*"];
    for a in keys {
        for b in keys {
            let forward = compare(a, b);
            let backward = compare(b, a);
            assert_eq!(forward, backward.reverse(), "{a} vs {b}");
        }
    }
}
