//! Configuration management for Quill
//!
//! Loaded from `.quill/config.toml` (or an explicit path). Every field has a
//! default, so a partial file only overrides what it names. Durations are
//! stored as milliseconds to keep the TOML flat.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::poll::PollConfig;
use crate::retry::RetryPolicy;
use crate::{QuillError, Result};

/// Top-level Quill configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuillConfig {
    /// Browser session options
    #[serde(default)]
    pub session: SessionConfig,

    /// Target application surfaces
    #[serde(default)]
    pub site: SiteConfig,

    /// Step budgets, poll windows and settle delays
    #[serde(default)]
    pub timings: TimingConfig,

    /// Where the CLI finds credentials
    #[serde(default)]
    pub credentials: CredentialEnv,

    /// Failure snapshot settings
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
}

/// Browser session launch options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Run without a visible window
    #[serde(default)]
    pub headless: bool,

    /// Default navigation budget of the page
    #[serde(default = "default_navigation_timeout_ms")]
    pub navigation_timeout_ms: u64,

    /// Budget for any other browser operation
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,

    /// Fixed window size; `None` keeps the maximised window
    #[serde(default)]
    pub viewport: Option<[u32; 2]>,

    /// User agent presented to the site
    #[serde(default = "default_user_agent")]
    pub user_agent: Option<String>,

    /// Extra browser command-line switches
    #[serde(default = "default_launch_args")]
    pub launch_args: Vec<String>,

    /// Headers added to every request
    #[serde(default = "default_extra_headers")]
    pub extra_headers: BTreeMap<String, String>,
}

/// URLs and markers describing the target application
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Sign-in page
    #[serde(default = "default_auth_url")]
    pub auth_url: String,

    /// Page hosting the composer
    #[serde(default = "default_target_url")]
    pub target_url: String,

    /// URL fragments meaning "still on the sign-in surface"
    #[serde(default = "default_auth_markers")]
    pub auth_markers: Vec<String>,

    /// URL fragments meaning "extra verification required"
    #[serde(default = "default_challenge_markers")]
    pub challenge_markers: Vec<String>,

    /// Prefix for diagnostic artifact file names
    #[serde(default = "default_artifact_prefix")]
    pub artifact_prefix: String,
}

/// Timeout, attempt budget and retry delay for one workflow step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepBudget {
    pub timeout_ms: u64,
    pub max_attempts: u32,
    #[serde(default)]
    pub retry_delay_ms: u64,
}

impl StepBudget {
    pub const fn new(timeout_ms: u64, max_attempts: u32, retry_delay_ms: u64) -> Self {
        Self {
            timeout_ms,
            max_attempts,
            retry_delay_ms,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(self.max_attempts, Duration::from_millis(self.retry_delay_ms))
    }
}

/// Per-step budgets
///
/// A config file may name any subset of steps, and any subset of fields
/// within a step. Everything else keeps its per-step default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StepBudgetOverrides")]
pub struct StepBudgets {
    pub launch: StepBudget,
    pub navigate_to_auth_surface: StepBudget,
    pub submit_credentials: StepBudget,
    pub confirm_authenticated: StepBudget,
    pub navigate_to_target_surface: StepBudget,
    pub open_composer: StepBudget,
    pub inject_content: StepBudget,
    pub submit_content: StepBudget,
    pub verify_submission: StepBudget,
}

impl Default for StepBudgets {
    fn default() -> Self {
        Self {
            launch: StepBudget::new(30_000, 2, 1_000),
            navigate_to_auth_surface: StepBudget::new(180_000, 3, 3_000),
            submit_credentials: StepBudget::new(90_000, 2, 2_000),
            confirm_authenticated: StepBudget::new(30_000, 1, 0),
            navigate_to_target_surface: StepBudget::new(120_000, 2, 3_000),
            open_composer: StepBudget::new(90_000, 3, 2_000),
            inject_content: StepBudget::new(120_000, 2, 1_000),
            submit_content: StepBudget::new(45_000, 1, 0),
            verify_submission: StepBudget::new(30_000, 1, 0),
        }
    }
}

/// One budget as written in a config file
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BudgetOverride {
    timeout_ms: Option<u64>,
    max_attempts: Option<u32>,
    retry_delay_ms: Option<u64>,
}

impl BudgetOverride {
    fn apply(self, budget: &mut StepBudget) {
        if let Some(timeout_ms) = self.timeout_ms {
            budget.timeout_ms = timeout_ms;
        }
        if let Some(max_attempts) = self.max_attempts {
            budget.max_attempts = max_attempts;
        }
        if let Some(retry_delay_ms) = self.retry_delay_ms {
            budget.retry_delay_ms = retry_delay_ms;
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StepBudgetOverrides {
    launch: BudgetOverride,
    navigate_to_auth_surface: BudgetOverride,
    submit_credentials: BudgetOverride,
    confirm_authenticated: BudgetOverride,
    navigate_to_target_surface: BudgetOverride,
    open_composer: BudgetOverride,
    inject_content: BudgetOverride,
    submit_content: BudgetOverride,
    verify_submission: BudgetOverride,
}

impl From<StepBudgetOverrides> for StepBudgets {
    fn from(overrides: StepBudgetOverrides) -> Self {
        let mut budgets = Self::default();
        overrides.launch.apply(&mut budgets.launch);
        overrides
            .navigate_to_auth_surface
            .apply(&mut budgets.navigate_to_auth_surface);
        overrides.submit_credentials.apply(&mut budgets.submit_credentials);
        overrides
            .confirm_authenticated
            .apply(&mut budgets.confirm_authenticated);
        overrides
            .navigate_to_target_surface
            .apply(&mut budgets.navigate_to_target_surface);
        overrides.open_composer.apply(&mut budgets.open_composer);
        overrides.inject_content.apply(&mut budgets.inject_content);
        overrides.submit_content.apply(&mut budgets.submit_content);
        overrides.verify_submission.apply(&mut budgets.verify_submission);
        budgets
    }
}

/// Poll windows inside steps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollTimings {
    /// Interval between locator sweeps
    pub interval_ms: u64,
    /// Wait for a form field or button to render
    pub element_wait_ms: u64,
    /// Wait for `document.readyState === "complete"`
    pub ready_state_ms: u64,
    /// Window in which the post-login redirect must leave the sign-in surface
    pub auth_confirm_ms: u64,
    /// Search rounds for the composer trigger, with a scroll between rounds
    pub composer_rounds: u32,
    /// Wait for the composer trigger in one search round
    pub composer_wait_ms: u64,
    /// Wait for the editable region to appear
    pub editor_wait_ms: u64,
    /// Attempts while waiting for the submit control to become enabled
    pub submit_enable_attempts: u32,
    /// Pause between those attempts
    pub submit_enable_interval_ms: u64,
    /// Window for the best-effort confirmation check
    pub confirmation_ms: u64,
}

impl Default for PollTimings {
    fn default() -> Self {
        Self {
            interval_ms: 1_000,
            element_wait_ms: 5_000,
            ready_state_ms: 10_000,
            auth_confirm_ms: 10_000,
            composer_rounds: 3,
            composer_wait_ms: 5_000,
            editor_wait_ms: 10_000,
            submit_enable_attempts: 15,
            submit_enable_interval_ms: 1_000,
            confirmation_ms: 5_000,
        }
    }
}

/// Fixed pauses after UI actions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettleTimings {
    pub after_login_ms: u64,
    pub after_target_ms: u64,
    pub after_composer_ms: u64,
    pub after_focus_ms: u64,
    pub after_typing_ms: u64,
    pub after_submit_ms: u64,
}

impl Default for SettleTimings {
    fn default() -> Self {
        Self {
            after_login_ms: 3_000,
            after_target_ms: 5_000,
            after_composer_ms: 2_000,
            after_focus_ms: 1_000,
            after_typing_ms: 2_000,
            after_submit_ms: 5_000,
        }
    }
}

/// All timing knobs of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Budget for one navigation to the sign-in or target surface
    #[serde(default = "default_surface_navigation_ms")]
    pub navigation_ms: u64,
    #[serde(default)]
    pub steps: StepBudgets,
    #[serde(default)]
    pub poll: PollTimings,
    #[serde(default)]
    pub settle: SettleTimings,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            navigation_ms: default_surface_navigation_ms(),
            steps: StepBudgets::default(),
            poll: PollTimings::default(),
            settle: SettleTimings::default(),
        }
    }
}

impl TimingConfig {
    /// Near-zero waits with the default attempt budgets, for scripted pages
    pub fn immediate() -> Self {
        let mut timings = Self::default();
        timings.navigation_ms = 1_000;
        timings.poll = PollTimings {
            interval_ms: 1,
            element_wait_ms: 20,
            ready_state_ms: 20,
            auth_confirm_ms: 20,
            composer_rounds: 3,
            composer_wait_ms: 20,
            editor_wait_ms: 20,
            submit_enable_attempts: 5,
            submit_enable_interval_ms: 1,
            confirmation_ms: 10,
        };
        timings.settle = SettleTimings {
            after_login_ms: 0,
            after_target_ms: 0,
            after_composer_ms: 0,
            after_focus_ms: 0,
            after_typing_ms: 0,
            after_submit_ms: 0,
        };
        for budget in [
            &mut timings.steps.launch,
            &mut timings.steps.navigate_to_auth_surface,
            &mut timings.steps.submit_credentials,
            &mut timings.steps.confirm_authenticated,
            &mut timings.steps.navigate_to_target_surface,
            &mut timings.steps.open_composer,
            &mut timings.steps.inject_content,
            &mut timings.steps.submit_content,
            &mut timings.steps.verify_submission,
        ] {
            budget.timeout_ms = 2_000;
            budget.retry_delay_ms = 1;
        }
        timings
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_ms)
    }

    /// Poll window with the shared interval
    pub fn poll(&self, timeout_ms: u64) -> PollConfig {
        PollConfig::from_millis(self.poll.interval_ms, timeout_ms)
    }
}

/// Environment variable names holding the credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialEnv {
    #[serde(default = "default_identity_env")]
    pub identity_env: String,
    #[serde(default = "default_secret_env")]
    pub secret_env: String,
}

/// Failure snapshot settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_diagnostics_dir")]
    pub dir: PathBuf,
}

// Default value providers
fn default_navigation_timeout_ms() -> u64 {
    60_000
}

fn default_timeout_ms() -> u64 {
    60_000
}

fn default_surface_navigation_ms() -> u64 {
    45_000
}

fn default_user_agent() -> Option<String> {
    Some(
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
            .to_string(),
    )
}

fn default_extra_headers() -> BTreeMap<String, String> {
    BTreeMap::from([(
        "Accept-Language".to_string(),
        "en-US,en;q=0.9".to_string(),
    )])
}

fn default_launch_args() -> Vec<String> {
    vec![
        "--no-sandbox".to_string(),
        "--disable-setuid-sandbox".to_string(),
        "--disable-blink-features=AutomationControlled".to_string(),
        "--start-maximized".to_string(),
    ]
}

fn default_auth_url() -> String {
    "https://www.linkedin.com/login".to_string()
}

fn default_target_url() -> String {
    "https://www.linkedin.com/feed/".to_string()
}

fn default_auth_markers() -> Vec<String> {
    vec!["/login".to_string(), "/uas/login".to_string()]
}

fn default_challenge_markers() -> Vec<String> {
    vec!["/checkpoint".to_string(), "/challenge".to_string()]
}

fn default_artifact_prefix() -> String {
    "linkedin".to_string()
}

fn default_identity_env() -> String {
    "LINKEDIN_EMAIL".to_string()
}

fn default_secret_env() -> String {
    "LINKEDIN_PASSWORD".to_string()
}

fn default_true() -> bool {
    true
}

fn default_diagnostics_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            headless: false,
            navigation_timeout_ms: default_navigation_timeout_ms(),
            default_timeout_ms: default_timeout_ms(),
            viewport: None,
            user_agent: default_user_agent(),
            launch_args: default_launch_args(),
            extra_headers: default_extra_headers(),
        }
    }
}

impl SessionConfig {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    pub fn window_size(&self) -> Option<(u32, u32)> {
        self.viewport.map(|[w, h]| (w, h))
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            auth_url: default_auth_url(),
            target_url: default_target_url(),
            auth_markers: default_auth_markers(),
            challenge_markers: default_challenge_markers(),
            artifact_prefix: default_artifact_prefix(),
        }
    }
}

impl SiteConfig {
    /// Whether `url` is an extra-verification surface
    pub fn is_challenge(&self, url: &str) -> bool {
        self.challenge_markers.iter().any(|m| url.contains(m.as_str()))
    }

    /// Whether `url` is still the sign-in surface
    pub fn is_auth_surface(&self, url: &str) -> bool {
        self.auth_markers.iter().any(|m| url.contains(m.as_str()))
    }
}

impl Default for CredentialEnv {
    fn default() -> Self {
        Self {
            identity_env: default_identity_env(),
            secret_env: default_secret_env(),
        }
    }
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: default_diagnostics_dir(),
        }
    }
}

impl QuillConfig {
    /// Default location relative to the working directory
    pub fn default_path(root: &Path) -> PathBuf {
        root.join(".quill/config.toml")
    }

    /// Load configuration from a specific file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| {
            QuillError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    /// Load configuration from `.quill/config.toml` or use defaults
    pub fn load_or_default(root: &Path) -> Result<Self> {
        let config_path = Self::default_path(root);

        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Write default configuration to `.quill/config.toml`
    pub fn write_default(root: &Path) -> Result<PathBuf> {
        let config_path = Self::default_path(root);
        if let Some(dir) = config_path.parent() {
            std::fs::create_dir_all(dir)?;
        }

        let content = Self::default().to_toml()?;
        std::fs::write(&config_path, content)?;
        Ok(config_path)
    }

    /// Render as pretty TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| QuillError::Config(format!("Failed to serialize config: {}", e)))
    }
}
