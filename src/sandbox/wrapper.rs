//! Turning a `def main():` fragment into a runnable program.
//!
//! The fragment is emitted first and untouched, followed by a fixed driver.
//! The only value interpolated into the driver is the result path, as a
//! JSON string literal (which Python also accepts as a string literal).

/// Exit code when `main` is missing or not callable.
pub const EXIT_ENTRY_MISSING: i32 = 3;
/// Exit code when `main()` raised.
pub const EXIT_ENTRY_FAULT: i32 = 4;
/// Exit code when the return value could not be serialized.
pub const EXIT_NOT_SERIALIZABLE: i32 = 5;

/// Suffix of the file the driver writes before renaming it into place.
pub const PARTIAL_SUFFIX: &str = ".partial";

const DRIVER: &str = r#"

def _sandbox_drive(result_path):
    import json as _json
    import os as _os
    import sys as _sys
    import traceback as _traceback

    entry = globals().get('main')
    if not callable(entry):
        print("main() is not defined or not callable", file=_sys.stderr)
        _sys.exit(@EXIT_ENTRY_MISSING@)

    try:
        value = entry()
    except Exception:
        _traceback.print_exc()
        _sys.stderr.flush()
        _sys.exit(@EXIT_ENTRY_FAULT@)

    try:
        payload = _json.dumps(value)
    except (TypeError, ValueError, RecursionError) as exc:
        print(f"{type(exc).__name__}: {exc}", file=_sys.stderr)
        _sys.exit(@EXIT_NOT_SERIALIZABLE@)

    partial = result_path + '@PARTIAL_SUFFIX@'
    with open(partial, 'w') as handle:
        handle.write(payload)
    _os.replace(partial, result_path)


if __name__ == '__main__':
    _sandbox_drive(@RESULT_PATH@)
"#;

/// Append the driver to `source`, writing the result to `result_path`.
///
/// `result_path` is the path as the running program sees it, i.e. the
/// in-jail path when nsjail is used.
pub fn wrap_source(source: &str, result_path: &str) -> String {
    // Serializing a &str cannot fail.
    let path_literal = serde_json::Value::from(result_path).to_string();

    let driver = DRIVER
        .replace("@EXIT_ENTRY_MISSING@", &EXIT_ENTRY_MISSING.to_string())
        .replace("@EXIT_ENTRY_FAULT@", &EXIT_ENTRY_FAULT.to_string())
        .replace("@EXIT_NOT_SERIALIZABLE@", &EXIT_NOT_SERIALIZABLE.to_string())
        .replace("@PARTIAL_SUFFIX@", PARTIAL_SUFFIX)
        .replace("@RESULT_PATH@", &path_literal);

    let mut program = String::with_capacity(source.len() + driver.len() + 1);
    program.push_str(source);
    if !source.ends_with('\n') {
        program.push('\n');
    }
    program.push_str(&driver);
    program
}
