pub mod address;
pub mod report;
pub mod user;

pub use address::{Address, AddressForm};
pub use report::{
    marker_for_title, Marker, MapLocation, NewReport, Report, ReportDetail, ReportImage,
    DEFAULT_MARKER_COLOR, KNOWN_TITLES,
};
pub use user::{NewUser, OAuthProfile, PublicUser, Role, TeamMember, User, UserSummary};
