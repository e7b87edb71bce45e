pub const FULL: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "+git.",
    env!("PUNCHLIST_GIT_COUNT"),
    ".",
    env!("PUNCHLIST_GIT_SHA"),
    env!("PUNCHLIST_GIT_DIRTY")
);
