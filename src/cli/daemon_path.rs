use std::path::PathBuf;

/// The daemon binary is installed next to the cli one.
pub fn to_daemon_path(mut path: PathBuf) -> PathBuf {
    path.set_file_name("prodtimer-daemon");
    #[cfg(windows)]
    {
        path.set_extension("exe");
    }
    path
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::to_daemon_path;

    #[cfg(unix)]
    #[test]
    fn sits_next_to_the_cli() {
        assert_eq!(
            to_daemon_path(PathBuf::from("/usr/local/bin/prodtimer")),
            PathBuf::from("/usr/local/bin/prodtimer-daemon")
        );
    }
}
