use crate::cli::{Args, DEFAULT_CRF, DEFAULT_EXTENSIONS, DEFAULT_PRESET, DEFAULT_QUALITY, DEFAULT_SPEED};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Options shared by the command line (`--config`) and the GUI's saved settings
#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFile {
    pub avif: Option<bool>,
    pub heic: Option<bool>,
    pub h265: Option<bool>,
    pub extensions: Option<String>,
    pub output_dir: Option<String>,
    pub recursive: Option<bool>,
    pub force: Option<bool>,
    pub dry_run: Option<bool>,
    pub jobs: Option<usize>,
    pub quality: Option<f32>,
    pub speed: Option<u8>,
    pub crf: Option<u8>,
    pub preset: Option<String>,
    /// Last folder opened from the GUI file dialogs
    pub last_directory: Option<String>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {:?}", path))
    }
}

/// Whether any of `names` was passed on the command line
///
/// Matches `--flag value`, `--flag=value`, and for short options the attached
/// form `-j4`.
fn flag_given(cli_flags: &[String], names: &[&str]) -> bool {
    cli_flags.iter().any(|arg| {
        names.iter().any(|name| {
            let is_short = name.len() == 2 && !name.starts_with("--");
            arg == name
                || arg.starts_with(&format!("{}=", name))
                || (is_short && arg.starts_with(name))
        })
    })
}

impl Args {
    /// Load configuration from a JSON file and merge with command-line arguments
    /// Command-line arguments take precedence over config file values
    pub fn load_and_merge_config(&mut self) -> Result<()> {
        if let Some(config_path) = self.config_file.clone() {
            let config = ConfigFile::load(&config_path)?;
            let cli_flags = std::env::args().collect::<Vec<_>>();
            self.merge_from_config(config, &cli_flags);

            if self.verbose && !self.json_progress {
                eprintln!("Loaded configuration from: {:?}", config_path);
            }
        }
        Ok(())
    }

    pub(crate) fn merge_from_config(&mut self, config: ConfigFile, cli_flags: &[String]) {
        // Boolean flags can only be switched on from the command line
        if !self.avif {
            self.avif = config.avif.unwrap_or(false);
        }
        if !self.heic {
            self.heic = config.heic.unwrap_or(false);
        }
        if !self.h265 {
            self.h265 = config.h265.unwrap_or(false);
        }
        if !self.recursive {
            self.recursive = config.recursive.unwrap_or(false);
        }
        if !self.force {
            self.force = config.force.unwrap_or(false);
        }
        if !self.dry_run {
            self.dry_run = config.dry_run.unwrap_or(false);
        }

        if self.output_dir.is_none() {
            self.output_dir = config.output_dir.map(PathBuf::from);
        }

        if !flag_given(cli_flags, &["--ext"]) && self.extensions_str == DEFAULT_EXTENSIONS {
            if let Some(ext) = config.extensions {
                self.extensions_str = ext;
            }
        }

        if !flag_given(cli_flags, &["-j", "--jobs"]) && self.jobs == 0 {
            if let Some(jobs) = config.jobs {
                self.jobs = jobs;
            }
        }

        if !flag_given(cli_flags, &["--quality"]) && self.quality == DEFAULT_QUALITY {
            if let Some(quality) = config.quality {
                self.quality = quality;
            }
        }

        if !flag_given(cli_flags, &["--speed"]) && self.speed == DEFAULT_SPEED {
            if let Some(speed) = config.speed {
                self.speed = speed;
            }
        }

        if !flag_given(cli_flags, &["--crf"]) && self.crf == DEFAULT_CRF {
            if let Some(crf) = config.crf {
                self.crf = crf;
            }
        }

        if !flag_given(cli_flags, &["--preset"]) && self.preset == DEFAULT_PRESET {
            if let Some(preset) = config.preset {
                self.preset = preset;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use temp_dir::TempDir;

    #[test]
    fn test_round_trip_through_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.child("nested").join("config.json");

        let config = ConfigFile {
            avif: Some(true),
            extensions: Some("jpg,mkv".to_string()),
            crf: Some(23),
            last_directory: Some("/home/me/Pictures".to_string()),
            ..Default::default()
        };
        config.save(&path).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("\"lastDirectory\""));
        assert_eq!(ConfigFile::load(&path).unwrap(), config);
    }

    #[test]
    fn test_load_rejects_invalid_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.child("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(ConfigFile::load(&path).is_err());
        assert!(ConfigFile::load(&dir.child("missing.json")).is_err());
    }

    #[test]
    fn test_merge_fills_defaults() {
        let config: ConfigFile = serde_json::from_str(
            r#"{ "heic": true, "h265": true, "extensions": "tif", "crf": 20, "preset": "slow", "outputDir": "/out" }"#,
        )
        .unwrap();

        let mut args = Args::default();
        args.merge_from_config(config, &["heiya".to_string()]);

        assert!(args.heic && args.h265 && !args.avif);
        assert_eq!(args.extensions_str, "tif");
        assert_eq!(args.crf, 20);
        assert_eq!(args.preset, "slow");
        assert_eq!(args.output_dir, Some(PathBuf::from("/out")));
    }

    #[test]
    fn test_command_line_wins() {
        let config = ConfigFile {
            crf: Some(20),
            preset: Some("slow".to_string()),
            ..Default::default()
        };

        let mut args = Args {
            // --crf 28 given explicitly, equal to the default
            crf: DEFAULT_CRF,
            preset: "fast".to_string(),
            ..Default::default()
        };
        let flags: Vec<String> = ["heiya", "--crf", "28", "--preset=fast"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        args.merge_from_config(config, &flags);

        assert_eq!(args.crf, DEFAULT_CRF);
        assert_eq!(args.preset, "fast");
    }

    #[test]
    fn test_flag_given() {
        let flags: Vec<String> = ["heiya", "-j", "4", "--ext=jpg"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert!(flag_given(&flags, &["-j", "--jobs"]));
        assert!(flag_given(&flags, &["--ext"]));
        assert!(!flag_given(&flags, &["--crf"]));
    }

    #[test]
    fn test_attached_short_jobs_wins_over_config() {
        let flags: Vec<String> = ["heiya", "-i", "photos", "-j0", "--avif"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert!(flag_given(&flags, &["-j", "--jobs"]));
        // Long names never match by prefix
        assert!(!flag_given(&flags, &["--av"]));

        let config = ConfigFile {
            jobs: Some(6),
            ..Default::default()
        };
        let mut args = Args {
            jobs: 0,
            ..Default::default()
        };
        args.merge_from_config(config, &flags);
        assert_eq!(args.jobs, 0);
    }
}
