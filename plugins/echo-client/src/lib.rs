//! Sample client app, resolvable as class `demo.EchoClient`.
//!
//! Copy the built library into a plugin's `lib` directory and declare it in the
//! plugin's `clients.config`:
//!
//! ```text
//! clientApp.0.main=demo.EchoClient
//! clientApp.0.classpath=$PLUGIN/lib
//! clientApp.0.args=$PLUGIN/echo.log start
//! clientApp.0.stopargs=$PLUGIN/echo.log stop
//! clientApp.0.delay=0
//! ```
//!
//! The first argument names an output file; the remaining arguments are
//! appended to it as one line.
use std::ffi::CStr;
use std::fs::OpenOptions;
use std::io::Write;
use std::os::raw::{c_char, c_int};

/// Append `args[1..]` as one space-separated line to the file named by `args[0]`.
pub fn echo(args: &[String]) -> std::io::Result<()> {
    let Some((target, words)) = args.split_first() else {
        return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, "missing output file"));
    };
    let mut file = OpenOptions::new().create(true).append(true).open(target)?;
    writeln!(file, "{}", words.join(" "))
}

/// Native entry point for `demo.EchoClient`. Returns 0 on success.
///
/// # Safety
///
/// `argv` must point at `argc` valid NUL-terminated strings.
#[no_mangle]
#[allow(non_snake_case)]
pub unsafe extern "C" fn demo_EchoClient_main(argc: c_int, argv: *const *const c_char) -> c_int {
    if argc < 0 || (argc > 0 && argv.is_null()) {
        return 2;
    }
    let args: Vec<String> = (0..argc as usize)
        .map(|i| unsafe { CStr::from_ptr(*argv.add(i)) }.to_string_lossy().into_owned())
        .collect();
    match echo(&args) {
        Ok(()) => 0,
        Err(_) => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    #[test]
    fn test_echo_appends_lines() {
        let dir = std::env::temp_dir().join(format!("echo-client-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let out = dir.join("echo.log");
        let out_arg = out.to_string_lossy().into_owned();

        echo(&[out_arg.clone(), "start".into(), "now".into()]).unwrap();
        echo(&[out_arg, "stop".into()]).unwrap();

        assert_eq!(std::fs::read_to_string(&out).unwrap(), "start now\nstop\n");
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_entry_point_reports_missing_target() {
        let argv: Vec<*const c_char> = Vec::new();
        let code = unsafe { demo_EchoClient_main(0, argv.as_ptr()) };
        assert_eq!(code, 1);
    }

    #[test]
    fn test_entry_point_writes_file() {
        let dir = std::env::temp_dir().join(format!("echo-client-entry-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let out = dir.join("echo.log");
        let args = [CString::new(out.to_string_lossy().as_bytes()).unwrap(), CString::new("hello").unwrap()];
        let argv: Vec<*const c_char> = args.iter().map(|a| a.as_ptr()).collect();

        let code = unsafe { demo_EchoClient_main(argv.len() as c_int, argv.as_ptr()) };

        assert_eq!(code, 0);
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "hello\n");
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
