//! Client identity profiles and request pacing for disguised fetches.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One plausible browser identity.
///
/// Headers are sent together so a request never pairs a Safari user agent with
/// Chrome client hints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserProfile {
    pub name: String,
    pub user_agent: String,
    pub accept_language: String,
    /// `sec-ch-ua` client hint; only Chromium browsers send it
    #[serde(default)]
    pub sec_ch_ua: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
}

impl BrowserProfile {
    fn chromium(name: &str, user_agent: &str, brand: &str, platform: &str) -> Self {
        Self {
            name: name.to_string(),
            user_agent: user_agent.to_string(),
            accept_language: "zh-TW,zh;q=0.9,en-US;q=0.8,en;q=0.7".to_string(),
            sec_ch_ua: Some(brand.to_string()),
            platform: Some(format!("\"{}\"", platform)),
        }
    }

    fn plain(name: &str, user_agent: &str, accept_language: &str) -> Self {
        Self {
            name: name.to_string(),
            user_agent: user_agent.to_string(),
            accept_language: accept_language.to_string(),
            sec_ch_ua: None,
            platform: None,
        }
    }

    /// Header pairs for this identity, in the order a browser sends them
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = Vec::with_capacity(5);
        if let Some(ref brand) = self.sec_ch_ua {
            headers.push(("sec-ch-ua", brand.clone()));
            headers.push(("sec-ch-ua-mobile", "?0".to_string()));
        }
        if let Some(ref platform) = self.platform {
            headers.push(("sec-ch-ua-platform", platform.clone()));
        }
        headers.push(("User-Agent", self.user_agent.clone()));
        headers.push(("Accept-Language", self.accept_language.clone()));
        headers
    }
}

/// The built-in identity pool
pub fn default_profiles() -> Vec<BrowserProfile> {
    vec![
        BrowserProfile::chromium(
            "chrome-windows",
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
            "\"Chromium\";v=\"124\", \"Google Chrome\";v=\"124\", \"Not-A.Brand\";v=\"99\"",
            "Windows",
        ),
        BrowserProfile::chromium(
            "chrome-macos",
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
            "\"Google Chrome\";v=\"123\", \"Not:A-Brand\";v=\"8\", \"Chromium\";v=\"123\"",
            "macOS",
        ),
        BrowserProfile::chromium(
            "edge-windows",
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36 Edg/124.0.0.0",
            "\"Chromium\";v=\"124\", \"Microsoft Edge\";v=\"124\", \"Not-A.Brand\";v=\"99\"",
            "Windows",
        ),
        BrowserProfile::plain(
            "safari-macos",
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
            "zh-TW,zh-Hant;q=0.9",
        ),
        BrowserProfile::plain(
            "firefox-linux",
            "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0",
            "zh-TW,zh;q=0.8,en-US;q=0.5,en;q=0.3",
        ),
    ]
}

/// How a profile is chosen for each request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Rotation {
    /// A uniformly random profile per request
    #[default]
    Random,
    /// Always the profile at `fixed_profile`
    Fixed,
}

/// Random delay inserted before each disguised request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    pub min: Duration,
    pub max: Duration,
}

impl Pacing {
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    /// No delay at all
    pub fn none() -> Self {
        Self {
            min: Duration::ZERO,
            max: Duration::ZERO,
        }
    }

    pub fn is_none(&self) -> bool {
        self.max.is_zero()
    }

    /// Draw a delay from `[min, max]`
    pub fn sample(&self) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        let min = self.min.as_millis() as u64;
        let max = self.max.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }
}

/// Identity pool plus selection policy
#[derive(Debug, Clone)]
pub struct ProfilePool {
    profiles: Vec<BrowserProfile>,
    rotation: Rotation,
    fixed_index: usize,
}

impl ProfilePool {
    pub fn new(profiles: Vec<BrowserProfile>, rotation: Rotation, fixed_index: usize) -> Self {
        let profiles = if profiles.is_empty() {
            default_profiles()
        } else {
            profiles
        };
        let fixed_index = fixed_index.min(profiles.len() - 1);
        Self {
            profiles,
            rotation,
            fixed_index,
        }
    }

    /// A pool that always hands out the same profile
    pub fn pinned(profile: BrowserProfile) -> Self {
        Self::new(vec![profile], Rotation::Fixed, 0)
    }

    pub fn pick(&self) -> &BrowserProfile {
        match self.rotation {
            Rotation::Fixed => &self.profiles[self.fixed_index],
            Rotation::Random => {
                let idx = rand::thread_rng().gen_range(0..self.profiles.len());
                &self.profiles[idx]
            }
        }
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

impl Default for ProfilePool {
    fn default() -> Self {
        Self::new(default_profiles(), Rotation::Random, 0)
    }
}
