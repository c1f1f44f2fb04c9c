pub mod conversation;
pub mod login;
pub mod profile;
pub mod refresh;
pub mod router;
pub mod sensor_poller;
pub mod weather_refresher;

pub use conversation::{ChatState, ConversationController, ConversationServices, LiveFeeds};
pub use login::{LoginController, LoginForm, LoginMode};
pub use profile::{ProfileController, ProfileForm, ProfileState, SaveOutcome};
pub use refresh::{LoadPhase, RefreshState};
pub use router::{AppServices, MarketView, RefreshIntervals, Screen, View, ViewRouter};
pub use sensor_poller::{SensorPoller, SensorState};
pub use weather_refresher::{WeatherRefresher, WeatherState};
