use std::sync::Arc;
use std::thread;
use xlpr_runtime::Runtime::RefCache;

#[test]
fn values_are_independent_copies() {
    let cache = RefCache::new();
    let mut input = vec![1u8, 2, 3];
    cache.set("k", &input);
    input[0] = 99;

    let mut first = cache.get("k").expect("present");
    assert_eq!(first, vec![1, 2, 3]);
    first[1] = 42;

    assert_eq!(cache.get("k"), Some(vec![1, 2, 3]));
}

#[test]
fn clear_forgets_every_key() {
    let cache = RefCache::new();
    cache.set("a", b"x");
    cache.set(String::from("b"), b"y");
    assert_eq!(cache.len(), 2);
    assert!(cache.contains("a"));

    cache.clear();
    assert!(cache.is_empty());
    assert_eq!(cache.get("a"), None);
    assert_eq!(cache.get("b"), None);
}

#[test]
fn set_overwrites() {
    let cache = RefCache::new();
    cache.set("k", b"old");
    cache.set("k", b"new");
    assert_eq!(cache.get("k").as_deref(), Some(&b"new"[..]));
    assert_eq!(cache.len(), 1);
}

#[test]
fn concurrent_readers_and_writers() {
    let cache = Arc::new(RefCache::new());
    let writers: Vec<_> = (0..4)
        .map(|t| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for i in 0..100 {
                    cache.set(format!("{t}-{i}"), &[t as u8, i as u8]);
                }
            })
        })
        .collect();
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for i in 0..100 {
                    if let Some(v) = cache.get(&format!("0-{i}")) {
                        assert_eq!(v, vec![0, i as u8]);
                    }
                }
            })
        })
        .collect();

    for h in writers.into_iter().chain(readers) {
        h.join().expect("thread panicked");
    }
    assert_eq!(cache.len(), 400);
}
