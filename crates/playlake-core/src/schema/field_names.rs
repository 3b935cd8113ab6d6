//! Field name constants for the raw JSON sources and the star-schema tables.
//!
//! Two naming conventions meet here:
//!
//! - **Raw song catalog** (snake_case): `song_id`, `artist_name`, ...
//! - **Raw log stream** (camelCase): `userId`, `sessionId`, `userAgent`, ...
//!
//! Output tables keep the source spelling of every column they carry through
//! unchanged, so `userId` stays camelCase in the fact table while the artist
//! attributes lose their `artist_` prefix.

/// Song catalog record fields (one JSON object per song)
pub mod song {
    pub const SONG_ID: &str = "song_id";
    pub const TITLE: &str = "title";
    pub const ARTIST_ID: &str = "artist_id";
    pub const ARTIST_NAME: &str = "artist_name";
    pub const ARTIST_LOCATION: &str = "artist_location";
    pub const ARTIST_LATITUDE: &str = "artist_latitude";
    pub const ARTIST_LONGITUDE: &str = "artist_longitude";
    pub const YEAR: &str = "year";
    pub const DURATION: &str = "duration";
    pub const NUM_SONGS: &str = "num_songs";
}

/// Log event fields (newline-delimited JSON)
pub mod log {
    /// Event time in milliseconds since Unix epoch
    pub const TS: &str = "ts";
    pub const USER_ID: &str = "userId";
    pub const FIRST_NAME: &str = "firstName";
    pub const LAST_NAME: &str = "lastName";
    pub const GENDER: &str = "gender";
    /// Subscription tier, `free` or `paid`
    pub const LEVEL: &str = "level";
    /// Song title as reported by the player
    pub const SONG: &str = "song";
    pub const ARTIST: &str = "artist";
    pub const SESSION_ID: &str = "sessionId";
    pub const LOCATION: &str = "location";
    pub const USER_AGENT: &str = "userAgent";
    /// Action that produced the event; only `NextSong` is a play
    pub const PAGE: &str = "page";
    pub const REGISTRATION: &str = "registration";
    pub const AUTH: &str = "auth";
    pub const METHOD: &str = "method";
    pub const STATUS: &str = "status";
    pub const ITEM_IN_SESSION: &str = "itemInSession";
    pub const LENGTH: &str = "length";
}

/// Output column names that do not exist in either raw source
pub mod star {
    pub const NAME: &str = "name";
    pub const LOCATION: &str = "location";
    pub const LATITUDE: &str = "latitude";
    pub const LONGITUDE: &str = "longitude";

    pub const START_TIME: &str = "start_time";
    pub const HOUR: &str = "hour";
    pub const DAY: &str = "day";
    pub const WEEK: &str = "week";
    pub const MONTH: &str = "month";
    pub const YEAR: &str = "year";

    /// Surrogate key of the fact table
    pub const SONGPLAY_ID: &str = "songplay_id";
}

/// Page value marking a song play in the log stream
pub const NEXT_SONG_PAGE: &str = "NextSong";
