//! Offline content layout
//!
//! ```text
//! <root>/<user>/files/<objId>/...
//! <root>/<user>/learning-modules/lm_<objId>/...
//! <root>/<user>/learning-modules/tmp/lm_<objId>/tmp_<objId>.zip
//! ```

use std::path::PathBuf;

const FILES_DIR: &str = "files";
const LEARNING_MODULES_DIR: &str = "learning-modules";
const TMP_DIR: &str = "tmp";

/// Resolves where offline content of a user lives
#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl StoragePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    pub fn user_dir(&self, user_id: i64) -> PathBuf {
        self.root.join(user_id.to_string())
    }

    /// Downloaded files of one object
    pub fn object_files_dir(&self, user_id: i64, obj_id: i64) -> PathBuf {
        self.user_dir(user_id)
            .join(FILES_DIR)
            .join(obj_id.to_string())
    }

    /// Parent of all learning modules of a user
    pub fn learning_modules_dir(&self, user_id: i64) -> PathBuf {
        self.user_dir(user_id).join(LEARNING_MODULES_DIR)
    }

    pub fn learning_module_dir_name(obj_id: i64) -> String {
        format!("lm_{obj_id}")
    }

    /// Final location of an installed learning module
    pub fn learning_module_dir(&self, user_id: i64, obj_id: i64) -> PathBuf {
        self.learning_modules_dir(user_id)
            .join(Self::learning_module_dir_name(obj_id))
    }

    /// Scratch directory for one download, removed after every run
    pub fn learning_module_tmp_dir(&self, user_id: i64, obj_id: i64) -> PathBuf {
        self.learning_modules_dir(user_id)
            .join(TMP_DIR)
            .join(Self::learning_module_dir_name(obj_id))
    }

    pub fn archive_file_name(obj_id: i64) -> String {
        format!("tmp_{obj_id}.zip")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn learning_module_layout() {
        let paths = StoragePaths::new("/data");

        assert_eq!(
            paths.learning_module_dir(3, 42),
            Path::new("/data/3/learning-modules/lm_42")
        );
        assert_eq!(
            paths.learning_module_tmp_dir(3, 42),
            Path::new("/data/3/learning-modules/tmp/lm_42")
        );
        assert_eq!(StoragePaths::archive_file_name(42), "tmp_42.zip");
    }

    #[test]
    fn files_are_separated_per_user() {
        let paths = StoragePaths::new("/data");
        assert_ne!(paths.object_files_dir(1, 9), paths.object_files_dir(2, 9));
        assert_eq!(paths.object_files_dir(1, 9), Path::new("/data/1/files/9"));
    }
}
