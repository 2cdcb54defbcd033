use std::path::PathBuf;

pub fn absolute_path(path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        let env = std::env::current_dir().unwrap();
        env.join(path)
    }
}

pub fn get_current_dir() -> PathBuf {
    std::env::current_dir().expect("Cannot get current working directory")
}
