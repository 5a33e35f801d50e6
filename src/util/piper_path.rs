use std::ffi::OsString;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub const PIPER_COMMAND_ENV: &str = "READER_PIPER_COMMAND";

/// How to launch Piper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PiperCommand {
    /// Full command line taken from `READER_PIPER_COMMAND`.
    Custom(Vec<String>),
    Executable(PathBuf),
    PythonModule,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PiperPathError {
    #[error("{PIPER_COMMAND_ENV} is set but contains no command")]
    EmptyOverride,
    #[error("{PIPER_COMMAND_ENV} could not be parsed: {0}")]
    InvalidOverride(String),
    #[error(
        "no piper executable in {} and python is not available on PATH to run 'python -m piper'",
        .0.display()
    )]
    Unavailable(PathBuf),
}

/// Resolve the Piper command: the environment override first, then the
/// bundled executable under `runtime_dir`, then `python -m piper`.
pub fn resolve(runtime_dir: &Path) -> Result<PiperCommand, PiperPathError> {
    if let Some(raw) = std::env::var_os(PIPER_COMMAND_ENV) {
        return parse_override(&raw.to_string_lossy());
    }

    let candidate = executable_path(runtime_dir);
    if candidate.exists() {
        return Ok(PiperCommand::Executable(candidate));
    }

    if which::which("python").is_ok() {
        return Ok(PiperCommand::PythonModule);
    }

    Err(PiperPathError::Unavailable(runtime_dir.join("piper")))
}

pub fn executable_path(runtime_dir: &Path) -> PathBuf {
    runtime_dir
        .join("piper")
        .join(if cfg!(windows) { "piper.exe" } else { "piper" })
}

fn parse_override(raw: &str) -> Result<PiperCommand, PiperPathError> {
    let parts = shlex::split(raw).ok_or_else(|| PiperPathError::InvalidOverride(raw.to_string()))?;
    if parts.is_empty() {
        return Err(PiperPathError::EmptyOverride);
    }
    Ok(PiperCommand::Custom(parts))
}

pub fn command_to_args(cmd: &PiperCommand) -> (OsString, Vec<OsString>) {
    match cmd {
        PiperCommand::Custom(parts) => {
            let mut parts = parts.iter().map(OsString::from);
            let program = parts.next().unwrap_or_default();
            (program, parts.collect())
        }
        PiperCommand::Executable(path) => (path.as_os_str().into(), vec![]),
        PiperCommand::PythonModule => (
            OsString::from("python"),
            vec!["-m".into(), "piper".into()],
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use serial_test::serial;

    struct EnvGuard {
        key: &'static str,
    }

    impl EnvGuard {
        fn set(key: &'static str, value: &str) -> Self {
            std::env::set_var(key, value);
            Self { key }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            std::env::remove_var(self.key);
        }
    }

    #[test]
    #[serial]
    fn override_is_shell_split() {
        let _guard = EnvGuard::set(PIPER_COMMAND_ENV, "python3 '/tmp/mock piper.py' --quiet");
        let temp = assert_fs::TempDir::new().unwrap();
        let command = resolve(temp.path()).unwrap();
        assert_eq!(
            command,
            PiperCommand::Custom(vec![
                "python3".into(),
                "/tmp/mock piper.py".into(),
                "--quiet".into()
            ])
        );
        let (program, args) = command_to_args(&command);
        assert_eq!(program, OsString::from("python3"));
        assert_eq!(args.len(), 2);
    }

    #[test]
    #[serial]
    fn empty_override_is_rejected() {
        let _guard = EnvGuard::set(PIPER_COMMAND_ENV, "   ");
        let temp = assert_fs::TempDir::new().unwrap();
        assert_eq!(resolve(temp.path()), Err(PiperPathError::EmptyOverride));
    }

    #[test]
    #[serial]
    fn unbalanced_quotes_are_rejected() {
        let _guard = EnvGuard::set(PIPER_COMMAND_ENV, "piper 'unterminated");
        let temp = assert_fs::TempDir::new().unwrap();
        assert!(matches!(
            resolve(temp.path()),
            Err(PiperPathError::InvalidOverride(_))
        ));
    }

    #[test]
    #[serial]
    fn bundled_executable_wins_over_python() {
        std::env::remove_var(PIPER_COMMAND_ENV);
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("piper").create_dir_all().unwrap();
        let exe = temp.child(if cfg!(windows) { "piper/piper.exe" } else { "piper/piper" });
        exe.touch().unwrap();
        assert_eq!(
            resolve(temp.path()),
            Ok(PiperCommand::Executable(exe.path().to_path_buf()))
        );
    }

    #[test]
    fn python_module_arguments() {
        let (program, args) = command_to_args(&PiperCommand::PythonModule);
        assert_eq!(program, OsString::from("python"));
        assert_eq!(args, vec![OsString::from("-m"), OsString::from("piper")]);
    }
}
