//! `key = value` parameter files for the table-building driver.
//!
//! Lines are trimmed, `#` starts a comment, and values keep their inner
//! whitespace. Lookups parse on demand so each caller states the type it
//! expects.

use crate::error::Error;
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

pub struct ParamFile {
    values: HashMap<String, String>,
}

impl ParamFile {
    pub fn read(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let mut values = HashMap::new();
        for (lineno, raw) in text.lines().enumerate() {
            let line = raw.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(Error::format(
                    path,
                    format!("line {}: expected key = value", lineno + 1),
                ));
            };
            values.insert(key.trim().to_string(), value.trim().to_string());
        }
        Ok(ParamFile { values })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// A required key.
    pub fn get<T: FromStr>(&self, key: &str) -> Result<T, Error> {
        match self.get_opt(key)? {
            Some(v) => Ok(v),
            None => Err(Error::config(format!("missing parameter {key:?}"))),
        }
    }

    /// An optional key; present but unparsable is still an error.
    pub fn get_opt<T: FromStr>(&self, key: &str) -> Result<Option<T>, Error> {
        match self.values.get(key) {
            None => Ok(None),
            Some(raw) => raw.parse::<T>().map(Some).map_err(|_| {
                Error::config(format!("parameter {key:?} has unusable value {raw:?}"))
            }),
        }
    }

    pub fn get_or<T: FromStr>(&self, key: &str, default: T) -> Result<T, Error> {
        Ok(self.get_opt(key)?.unwrap_or(default))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_keys_comments_and_blanks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.par");
        std::fs::write(
            &path,
            "# a run\nNside = 64\n\nmaskfile = sky mask.dat # inline\nclean_tmpfiles=true\n",
        )
        .unwrap();
        let p = ParamFile::read(&path).unwrap();
        assert_eq!(p.get::<usize>("Nside").unwrap(), 64);
        assert_eq!(p.get::<String>("maskfile").unwrap(), "sky mask.dat");
        assert!(p.get::<bool>("clean_tmpfiles").unwrap());
        assert!(p.get_opt::<f64>("dcosbin").unwrap().is_none());
        assert_eq!(p.get_or("dtheta", 1.5).unwrap(), 1.5);
        assert!(p.get::<usize>("missing").is_err());
        assert!(p.get::<usize>("maskfile").is_err());
    }

    #[test]
    fn bad_lines_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.par");
        std::fs::write(&path, "Nside 64\n").unwrap();
        assert!(ParamFile::read(&path).is_err());
    }
}
