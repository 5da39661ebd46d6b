pub mod browser;
pub mod error;
pub mod extract;
pub mod platforms;
mod retry;
pub mod strategy;
pub mod text;
pub mod webdriver;

pub use browser::{BrowserLauncher, BrowserSession, ElementHandle, Locator, SessionOptions};
pub use error::{BrowserError, ExtractError};
pub use extract::{Extractor, ExtractorSettings, ReviewSource};
pub use platforms::PlatformProfile;
pub use webdriver::{WebDriverLauncher, WebDriverSession};
