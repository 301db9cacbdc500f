use std::default::Default;
use std::str::FromStr;

use strum_macros::{Display, EnumString};

/// How the inspector treats lightweight-locked (displaced) headers.
#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumString, Display)]
#[strum(ascii_case_insensitive)]
pub enum InspectionMode {
    /// Follow [`crate::vm::TargetProcess::is_debugging`].
    #[strum(to_string = "auto")]
    Auto,
    /// The observer reads a different, suspended image. Displaced headers are
    /// stable and may be followed.
    #[strum(to_string = "debugging")]
    Debugging,
    /// The observer may race with the image's own threads. Displaced headers
    /// are never followed.
    #[strum(to_string = "in_process", serialize = "inprocess")]
    InProcess,
}

/// The default upper bound on blocks walked by one monitor iterator.
pub const DEFAULT_MAX_MONITOR_BLOCKS: usize = 1 << 16;

fn always_valid<T>(_: &T) -> bool {
    true
}

macro_rules! options {
    ($($name:ident: $type:ty[$validator:expr] = $default:expr),*,) => [
        options!($($name: $type[$validator] = $default),*);
    ];
    ($($name:ident: $type:ty[$validator:expr] = $default:expr),*) => [
        #[derive(Clone, Debug)]
        pub struct Options {
            $(pub $name: $type),*
        }
        impl Options {
            /// Options with their built-in defaults, ignoring the environment.
            pub fn builtin() -> Self {
                Options {
                    $($name: $default),*
                }
            }

            /// Set an option by its snake_case name. Returns false (and keeps the
            /// old value) if the name is unknown, or the value does not parse or validate.
            pub fn set_from_str(&mut self, s: &str, val: &str) -> bool {
                match s {
                    // Parse the given value from str (by env vars or by calling process()) to the right type
                    $(stringify!($name) => if let Ok(ref val) = val.parse::<$type>() {
                        // Validate
                        let validate_fn = $validator;
                        let is_valid = validate_fn(val);
                        if is_valid {
                            // Only set value if valid.
                            self.$name = val.clone();
                        } else {
                            warn!("Unable to set {}={:?}. Invalid value. Default value will be used.", s, val);
                        }
                        is_valid
                    } else {
                        warn!("Unable to set {}={:?}. Cant parse value. Default value will be used.", s, val);
                        false
                    })*
                    _ => {
                        warn!("Unknown option {}", s);
                        false
                    }
                }
            }

            /// Read every `OBJSYNC_*` environment variable that names an option.
            pub fn read_env_var_settings(&mut self) {
                const PREFIX: &str = "OBJSYNC_";
                for (key, val) in std::env::vars() {
                    // strip the prefix, and get the lower case string
                    if let Some(rest_of_key) = key.strip_prefix(PREFIX) {
                        let lowercase: &str = &rest_of_key.to_lowercase();
                        match lowercase {
                            $(stringify!($name) => { self.set_from_str(lowercase, &val); },)*
                            _ => {}
                        }
                    }
                }
            }
        }
        impl Default for Options {
            fn default() -> Self {
                // If we have env vars that start with OBJSYNC_ and match any option (such as OBJSYNC_INSPECTION_MODE),
                // we set the option to its value (if it is a valid value). Otherwise, use the default value.
                let mut options = Self::builtin();
                options.read_env_var_settings();
                options
            }
        }
    ]
}

options! {
    // Whether displaced headers may be followed when resolving identity hashes.
    inspection_mode:    InspectionMode [always_valid] = InspectionMode::Auto,
    // Upper bound on monitor blocks walked by one iterator. A list read from a running image may be torn or cyclic.
    max_monitor_blocks: usize          [|v: &usize| *v > 0] = DEFAULT_MAX_MONITOR_BLOCKS,
}

impl Options {
    /// Set an option by its camelCase name, as debugger command lines spell them
    /// (e.g. `maxMonitorBlocks`).
    pub fn set_from_camelcase_str(&mut self, s: &str, val: &str) -> bool {
        trace!("Trying to process option pair: ({}, {})", s, val);

        let mut sr = String::with_capacity(s.len());
        for c in s.chars() {
            if c.is_uppercase() {
                sr.push('_');
                for c in c.to_lowercase() {
                    sr.push(c);
                }
            } else {
                sr.push(c)
            }
        }

        let result = self.set_from_str(sr.as_str(), val);
        if result {
            trace!("Validation passed");
        } else {
            trace!("Validation failed")
        }
        result
    }

    /// Resolve [`InspectionMode::Auto`] against what the target process reports.
    pub fn is_debugging(&self, target_is_debugging: bool) -> bool {
        match self.inspection_mode {
            InspectionMode::Auto => target_is_debugging,
            InspectionMode::Debugging => true,
            InspectionMode::InProcess => false,
        }
    }
}

impl FromStr for Options {
    type Err = String;

    /// Parse a comma separated `name=value` list, e.g.
    /// `inspection_mode=debugging,max_monitor_blocks=128`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut options = Options::builtin();
        for pair in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (name, value) = pair
                .split_once('=')
                .ok_or_else(|| format!("Expected name=value, found {:?}", pair))?;
            if !options.set_from_str(name.trim(), value.trim()) {
                return Err(format!("Invalid option {:?}", pair));
            }
        }
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::test_util::{serial_test, with_cleanup};

    #[test]
    fn no_env_var() {
        serial_test(|| {
            let options = Options::default();
            assert_eq!(options.inspection_mode, InspectionMode::Auto);
            assert_eq!(options.max_monitor_blocks, DEFAULT_MAX_MONITOR_BLOCKS);
        })
    }

    #[test]
    fn with_valid_env_var() {
        serial_test(|| {
            with_cleanup(
                || {
                    std::env::set_var("OBJSYNC_MAX_MONITOR_BLOCKS", "42");
                    std::env::set_var("OBJSYNC_INSPECTION_MODE", "InProcess");

                    let options = Options::default();
                    assert_eq!(options.max_monitor_blocks, 42);
                    assert_eq!(options.inspection_mode, InspectionMode::InProcess);
                },
                || {
                    std::env::remove_var("OBJSYNC_MAX_MONITOR_BLOCKS");
                    std::env::remove_var("OBJSYNC_INSPECTION_MODE");
                },
            )
        })
    }

    #[test]
    fn with_invalid_env_var_value() {
        serial_test(|| {
            with_cleanup(
                || {
                    // invalid value, we cannot walk zero blocks.
                    std::env::set_var("OBJSYNC_MAX_MONITOR_BLOCKS", "0");

                    let options = Options::default();
                    assert_eq!(options.max_monitor_blocks, DEFAULT_MAX_MONITOR_BLOCKS);
                },
                || {
                    std::env::remove_var("OBJSYNC_MAX_MONITOR_BLOCKS");
                },
            )
        })
    }

    #[test]
    fn with_unparsable_env_var_value() {
        serial_test(|| {
            with_cleanup(
                || {
                    std::env::set_var("OBJSYNC_INSPECTION_MODE", "sometimes");

                    let options = Options::default();
                    assert_eq!(options.inspection_mode, InspectionMode::Auto);
                },
                || {
                    std::env::remove_var("OBJSYNC_INSPECTION_MODE");
                },
            )
        })
    }

    #[test]
    fn camelcase_names() {
        let mut options = Options::builtin();
        assert!(options.set_from_camelcase_str("maxMonitorBlocks", "7"));
        assert!(options.set_from_camelcase_str("inspectionMode", "debugging"));
        assert_eq!(options.max_monitor_blocks, 7);
        assert_eq!(options.inspection_mode, InspectionMode::Debugging);
        assert!(!options.set_from_camelcase_str("noSuchOption", "1"));
    }

    #[test]
    fn parse_option_list() {
        let options: Options = "inspection_mode=in_process, max_monitor_blocks=3"
            .parse()
            .unwrap_or_else(|e| panic!("{}", e));
        assert_eq!(options.max_monitor_blocks, 3);
        assert_eq!(options.inspection_mode, InspectionMode::InProcess);
        assert!("max_monitor_blocks".parse::<Options>().is_err());
        assert!("max_monitor_blocks=-1".parse::<Options>().is_err());
    }

    #[test]
    fn auto_follows_target() {
        let mut options = Options::builtin();
        assert!(options.is_debugging(true));
        assert!(!options.is_debugging(false));
        options.inspection_mode = InspectionMode::InProcess;
        assert!(!options.is_debugging(true));
        options.inspection_mode = InspectionMode::Debugging;
        assert!(options.is_debugging(false));
    }
}
