#![forbid(unsafe_code)]

use anyhow::{Result, anyhow};
use log::{info, warn, error, LevelFilter};
use serde::Deserialize;
use std::collections::HashMap;
use std::{env, fmt, fs, path::Path};
use lazy_static::lazy_static;
use structopt::StructOpt;

use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Config as LogConfig, Root};
use log4rs::encode::pattern::PatternEncoder;

// Server Utilities
use crate::utils::{server_utils, errors::Errors};

// ***************************************************************************
//                                Constants
// ***************************************************************************
// Directory and file locations. Unless otherwise noted, all files and directories
// are relative to the root directory.
const ENV_ROOT_DIR         : &str = "ACROSTIC_ROOT_DIR";
const DEFAULT_ROOT_DIR     : &str = ".";
const CONFIG_DIR           : &str = "/config";
const LOGS_DIR             : &str = "/logs";
const PUBLIC_DIR           : &str = "/public";
const LOG4RS_CONFIG_FILE   : &str = "/log4rs.yml";     // relative to config dir
const SERVER_CONFIG_FILE   : &str = "/acrostic.toml";  // relative to config dir

// Environment files are searched in this order and only the first one found is read.
const ENV_FILES            : [&str; 2] = [".env.local", ".env"];
pub const ENV_API_KEY      : &str = "ANTHROPIC_API_KEY";

// Networking.
const DEFAULT_HTTP_ADDR    : &str = "http://localhost";
const DEFAULT_HTTP_PORT    : u16  = 3000;

// Generator defaults.
const DEFAULT_API_BASE_URL : &str = "https://api.anthropic.com/v1";
const DEFAULT_MODEL        : &str = "claude-sonnet-4-5-20250929";
const DEFAULT_MAX_TOKENS   : u32  = 20000;
const DEFAULT_TEMPERATURE  : f32  = 1.0;

// Console log pattern used when no log4rs file is installed.
const DEFAULT_LOG_PATTERN  : &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} {h({l})} {t} - {m}{n}";

// ***************************************************************************
//                             Static Variables
// ***************************************************************************
// Assign the command line arguments BEFORE RUNTIME_CTX is initialized in main.
lazy_static! {
    pub static ref SERVER_ARGS: ServerArgs = init_server_args();
}

// Calculate the data directories BEFORE RUNTIME_CTX is initialized in main.
lazy_static! {
    pub static ref SERVER_DIRS: ServerDirs = init_server_dirs();
}

// ***************************************************************************
//                             Directory Structs
// ***************************************************************************
// ---------------------------------------------------------------------------
// ServerDirs:
// ---------------------------------------------------------------------------
#[derive(Debug)]
pub struct ServerDirs {
    pub root_dir: String,
    pub config_dir: String,
    pub logs_dir: String,
}

// ***************************************************************************
//                               Config Structs
// ***************************************************************************
// ---------------------------------------------------------------------------
// ServerArgs:
// ---------------------------------------------------------------------------
#[derive(Debug, StructOpt)]
#[structopt(name = "acrostic_args", about = "Command line arguments for the acrostic poem server.")]
pub struct ServerArgs {
    /// Specify the server's root directory.
    ///
    /// The root directory holds the config and logs subdirectories, the
    /// default public directory and the optional .env.local/.env files.
    /// It is calculated using the following priority order:
    ///
    ///   1. If set, the value of the ACROSTIC_ROOT_DIR environment,
    ///
    ///   2. Otherwise, if set, the value of the --root-dir command line argument,
    ///
    ///   3. Otherwise, the current directory
    ///
    #[structopt(short, long)]
    pub root_dir: Option<String>,

    /// Override the http_port value from the configuration file.
    #[structopt(short, long)]
    pub port: Option<u16>,
}

// ---------------------------------------------------------------------------
// Parms:
// ---------------------------------------------------------------------------
#[derive(Debug)]
pub struct Parms {
    pub config: Config,
}

// ---------------------------------------------------------------------------
// RuntimeCtx:
// ---------------------------------------------------------------------------
pub struct RuntimeCtx {
    pub parms: Parms,
    pub public_dir: String,
    pub env_file: Option<String>,
    pub api_key: Option<String>,
    pub server_args: &'static ServerArgs,
    pub server_dirs: &'static ServerDirs,
}

// The api key never reaches the log.
impl fmt::Debug for RuntimeCtx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = if self.api_key.is_some() {"<redacted>"} else {"<not set>"};
        f.debug_struct("RuntimeCtx")
            .field("parms", &self.parms)
            .field("public_dir", &self.public_dir)
            .field("env_file", &self.env_file)
            .field("api_key", &key)
            .field("server_args", self.server_args)
            .field("server_dirs", self.server_dirs)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Config:
// ---------------------------------------------------------------------------
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub title: String,
    pub http_addr: String,
    pub http_port: u16,
    pub public_dir: Option<String>,
    pub tls_key: Option<String>,
    pub tls_cert: Option<String>,
    pub generator: GeneratorConfig,
}

impl Config {
    pub fn new() -> Self {
        Config::default()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            title: "Acrostic Server".to_string(),
            http_addr: DEFAULT_HTTP_ADDR.to_string(),
            http_port: DEFAULT_HTTP_PORT,
            public_dir: None,
            tls_key: None,
            tls_cert: None,
            generator: GeneratorConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// GeneratorConfig:
// ---------------------------------------------------------------------------
/// Settings passed with every call to the text generation API.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

// ***************************************************************************
//                            Directory Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// init_server_args:
// ---------------------------------------------------------------------------
/** Get the command line arguments. */
fn init_server_args() -> ServerArgs {
    let args = ServerArgs::from_args();
    println!("{:?}", args);
    args
}

// ---------------------------------------------------------------------------
// init_server_dirs:
// ---------------------------------------------------------------------------
/** Calculate the external data directories.  The logs directory is created
 * if it doesn't exist so that file appenders can open their files.
 */
fn init_server_dirs() -> ServerDirs {
    let root_dir = get_root_dir();
    check_root_dir(&root_dir);

    let config_dir = root_dir.clone() + CONFIG_DIR;
    let logs_dir = root_dir.clone() + LOGS_DIR;
    if let Err(e) = fs::create_dir_all(&logs_dir) {
        panic!("Make directory error for {}: {}", logs_dir, &e.to_string());
    }

    ServerDirs { root_dir, config_dir, logs_dir }
}

// ---------------------------------------------------------------------------
// check_root_dir:
// ---------------------------------------------------------------------------
/** Check that the root path is absolute and names an existing directory.
 *
 * Any failure results in a panic.
 */
fn check_root_dir(dir: &str) {
    let path = Path::new(dir);
    if !path.is_absolute() {
        panic!("The root directory path must be absolute: {}", dir);
    }
    if !path.is_dir() {
        panic!("The root directory path must be an existing directory: {}", dir);
    }
}

// ---------------------------------------------------------------------------
// get_root_dir:
// ---------------------------------------------------------------------------
fn get_root_dir() -> String {
    // Order of precedence:
    //  1. Environment variable
    //  2. Command line --root-dir argument
    //  3. Default location
    //
    let root_dir = env::var(ENV_ROOT_DIR).unwrap_or_else(
        |_| {
            match SERVER_ARGS.root_dir.clone() {
                Some(r) => r,
                None => DEFAULT_ROOT_DIR.to_string(),
            }
        });

    // Canonicalize the path.
    server_utils::get_absolute_path(&root_dir)
}

// ***************************************************************************
//                               Log Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// init_log:
// ---------------------------------------------------------------------------
/** Initialize log4rs from the installed configuration file or, when there
 * is none, from a console-only configuration at info level.
 */
pub fn init_log() {
    let logconfig = init_log_config();
    if Path::new(&logconfig).is_file() {
        match log4rs::init_file(logconfig.clone(), Default::default()) {
            Ok(_) => (),
            Err(e) => {
                println!("{}", e);
                let s = format!("{}", Errors::Log4rsInitialization(logconfig));
                panic!("{}", s);
            },
        }
        info!("Log4rs initialized using: {}", logconfig);
    } else {
        if let Err(e) = init_console_log() {
            panic!("{}: {}", Errors::Log4rsInitialization(logconfig), e);
        }
        info!("Log4rs initialized to console, no file found at: {}", logconfig);
    }
    info!("Log directory: {}", SERVER_DIRS.logs_dir);
}

// ---------------------------------------------------------------------------
// init_log_config:
// ---------------------------------------------------------------------------
fn init_log_config() -> String {
    SERVER_DIRS.config_dir.clone() + LOG4RS_CONFIG_FILE
}

// ---------------------------------------------------------------------------
// init_console_log:
// ---------------------------------------------------------------------------
fn init_console_log() -> Result<()> {
    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(DEFAULT_LOG_PATTERN)))
        .build();
    let config = LogConfig::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(Root::builder().appender("stdout").build(LevelFilter::Info))?;
    log4rs::init_config(config)?;
    Ok(())
}

// ***************************************************************************
//                             Parms Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// get_parms:
// ---------------------------------------------------------------------------
/** Retrieve the application parameters from the configuration file in the
 * config directory.  If the file cannot be read the default values are used;
 * a file that exists but cannot be parsed is an error.
 */
fn get_parms() -> Result<Parms> {
    // Get the config file path from its data directory.
    let config_file = SERVER_DIRS.config_dir.clone() + SERVER_CONFIG_FILE;

    // Read the cofiguration file.
    let config_file_abs = server_utils::get_absolute_path(&config_file);
    info!("{}", Errors::ReadingConfigFile(config_file_abs.clone()));
    let contents = match fs::read_to_string(&config_file_abs) {
        Ok(c) => c,
        Err(_) => {
            info!("Unable to read configuration at {}. Using default values.", config_file);
            return Ok(Parms { config: Config::new() });
        }
    };

    let mut config = match parse_config(&contents) {
        Ok(c)  => c,
        Err(e) => {
            let msg = format!("{}\n   {}", Errors::TOMLParseError(config_file_abs), e);
            error!("{}", msg);
            return Result::Err(anyhow!(msg));
        }
    };

    // The command line port wins over the file.
    if let Some(port) = SERVER_ARGS.port {
        config.http_port = port;
    }

    Ok(Parms { config })
}

// ---------------------------------------------------------------------------
// parse_config:
// ---------------------------------------------------------------------------
pub fn parse_config(contents: &str) -> Result<Config> {
    Ok(toml::from_str(contents)?)
}

// ***************************************************************************
//                          Environment Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// load_env_file:
// ---------------------------------------------------------------------------
/** Read the first environment file found in the directory into a map.  Keys
 * with empty values and lines that don't parse are skipped, so only a file
 * that cannot be opened is an error.  Returns the name of the file read, if any.
 */
pub fn load_env_file(dir: &str) -> Result<(Option<String>, HashMap<String, String>)> {
    let mut vars = HashMap::new();
    for env_file in ENV_FILES {
        let env_path = Path::new(dir).join(env_file);
        if !env_path.is_file() {
            continue;
        }

        let path_str = env_path.to_string_lossy().to_string();
        let iter = dotenv::from_path_iter(&env_path)
            .map_err(|e| anyhow!("{}: {}", Errors::ReadingEnvFile(path_str.clone()), e))?;
        for item in iter {
            let (key, value) = match item {
                Ok(kv) => kv,
                Err(e) => {
                    warn!("{}: skipping line: {}", Errors::ReadingEnvFile(path_str.clone()), e);
                    continue;
                }
            };
            if !key.is_empty() && !value.is_empty() {
                vars.insert(key, value);
            }
        }
        return Ok((Some(env_file.to_string()), vars));
    }

    Ok((None, vars))
}

// ---------------------------------------------------------------------------
// resolve_api_key:
// ---------------------------------------------------------------------------
/** Values from the environment file take precedence over the process
 * environment.
 */
pub fn resolve_api_key(file_vars: &HashMap<String, String>) -> Option<String> {
    file_vars.get(ENV_API_KEY).cloned()
        .or_else(|| env::var(ENV_API_KEY).ok())
        .filter(|k| !k.trim().is_empty())
}

// ***************************************************************************
//                             Config Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// init_runtime_context:
// ---------------------------------------------------------------------------
pub fn init_runtime_context() -> RuntimeCtx {
    // If either of these fail the application aborts.
    let parms = get_parms().expect("FAILED to read configuration file.");
    let (env_file, env_vars) = load_env_file(&SERVER_DIRS.root_dir)
        .expect("FAILED to read environment file.");
    if let Some(f) = &env_file {
        info!("Environment variables loaded from: {}", f);
    }

    // The key is not validated here, calls to the generator fail without it.
    let api_key = resolve_api_key(&env_vars);

    let public_dir = match &parms.config.public_dir {
        Some(d) => server_utils::get_absolute_path(d),
        None => SERVER_DIRS.root_dir.clone() + PUBLIC_DIR,
    };

    RuntimeCtx {parms, public_dir, env_file, api_key,
                server_args: &SERVER_ARGS, server_dirs: &SERVER_DIRS}
}

// ***************************************************************************
//                                  Tests
// ***************************************************************************
#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn default_config() {
        let config = Config::new();
        assert_eq!(config.http_port, 3000);
        assert_eq!(config.generator.model, "claude-sonnet-4-5-20250929");
        assert_eq!(config.generator.max_tokens, 20000);
        assert_eq!(config.generator.temperature, 1.0);
        assert!(config.public_dir.is_none());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let contents = r#"
            http_port = 8080

            [generator]
            model = "claude-haiku"
        "#;
        let config = parse_config(contents).unwrap();
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.title, "Acrostic Server");
        assert_eq!(config.generator.model, "claude-haiku");
        assert_eq!(config.generator.base_url, "https://api.anthropic.com/v1");
    }

    #[test]
    fn bad_toml_is_error() {
        assert!(parse_config("http_port = \"not a number\"").is_err());
    }

    #[test]
    fn env_local_wins_over_env() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".env"), "ANTHROPIC_API_KEY=from-env\n").unwrap();
        fs::write(dir.path().join(".env.local"),
                  "ANTHROPIC_API_KEY=from-local\nEMPTY=\n").unwrap();

        let (file, vars) = load_env_file(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(file.as_deref(), Some(".env.local"));
        assert_eq!(vars.get(ENV_API_KEY).map(String::as_str), Some("from-local"));
        assert!(!vars.contains_key("EMPTY"));
        assert_eq!(resolve_api_key(&vars).as_deref(), Some("from-local"));
    }

    #[test]
    fn malformed_env_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".env"),
                  "ANTHROPIC_API_KEY=k\nthis line has no equals\nOTHER=v\n").unwrap();

        let (file, vars) = load_env_file(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(file.as_deref(), Some(".env"));
        assert_eq!(vars.get(ENV_API_KEY).map(String::as_str), Some("k"));
        assert_eq!(vars.get("OTHER").map(String::as_str), Some("v"));
        assert_eq!(vars.len(), 2);
    }

    #[test]
    fn no_env_file() {
        let dir = tempfile::tempdir().unwrap();
        let (file, vars) = load_env_file(dir.path().to_str().unwrap()).unwrap();
        assert!(file.is_none());
        assert!(vars.is_empty());
    }
}
