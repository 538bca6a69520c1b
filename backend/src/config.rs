//! Process-wide constants. None of these affect game semantics.

use std::time::Duration;

pub const BANNER: &str = r"    _________             ________
   / ____/ (_)___        / ____/ /___  ____
  / /_  / / / __ \______/ /_  / / __ \/ __ \
 / __/ / / / /_/ /_____/ __/ / / /_/ / /_/ /
/_/   /_/_/ .___/     /_/   /_/\____/ .___/
         /_/                       /_/      ";

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Clients must show signs of life within this window or the socket closes.
pub const PING_INTERVAL: Duration = Duration::from_secs(60);
pub const PING_WAIT: Duration = Duration::from_secs(10);

/// Artificial pause before the AI starts computing, so moves do not land
/// instantly.
pub const AI_MOVE_DELAY: Duration = Duration::from_secs(1);

/// Upper bound on a single AI search; the cancel token fires when it
/// elapses and the search returns its best partial result.
pub const AI_THINK_TIMEOUT: Duration = Duration::from_secs(10);

/// Delay before the AI votes for a rematch after a game ends.
pub const AI_REMATCH_DELAY: Duration = Duration::from_secs(2);

/// Chat reads return at most this many trailing messages.
pub const CHAT_HISTORY_LIMIT: usize = 100;

pub const ROOM_ID_CHARSET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
pub const ROOM_ID_LENGTH: usize = 4;
pub const ROOM_ID_MAX_ATTEMPTS: usize = 1000;
