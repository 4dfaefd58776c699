use crate::is_builtin;

#[test]
fn recognizes_builtins() {
    for name in ["fs", "fs/promises", "path", "url", "worker_threads", "v8"] {
        assert!(is_builtin(name), "{name}");
    }
}

#[test]
fn rejects_non_builtins() {
    for name in ["node:fs", "lodash", "FS", "fs/", "fs/extra", ""] {
        assert!(!is_builtin(name), "{name}");
    }
}
