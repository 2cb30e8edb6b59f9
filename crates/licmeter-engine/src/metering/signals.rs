//! Billing metric selectors and their unit weights

/// One billing metric and the units each of its counts is worth
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Signal {
    pub metric: &'static str,
    pub weight: f64,
}

const fn signal(metric: &'static str, weight: f64) -> Signal {
    Signal { metric, weight }
}

/// Real user monitoring signals, keyed by application
pub const RUM_SIGNALS: &[Signal] = &[
    signal("builtin:billing.apps.web.sessionsWithoutReplayByApplication", 0.25),
    signal("builtin:billing.apps.web.sessionsWithReplayByApplication", 1.0),
    signal("builtin:billing.apps.web.userActionPropertiesByApplication", 0.01),
    signal("builtin:billing.apps.custom.sessionsWithoutReplayByApplication", 0.25),
    signal("builtin:billing.apps.custom.userActionPropertiesByDeviceApplication", 0.01),
    signal("builtin:billing.apps.mobile.sessionsWithoutReplayByApplication", 0.25),
    signal("builtin:billing.apps.mobile.userActionPropertiesByMobileApplication", 0.01),
    signal("builtin:billing.apps.mobile.sessionsWithReplayByApplication", 1.0),
];

/// Synthetic monitoring signals, keyed by test
pub const SYNTHETIC_SIGNALS: &[Signal] = &[
    signal("builtin:billing.synthetic.actions", 1.0),
    signal("builtin:billing.synthetic.requests", 0.1),
    signal("builtin:billing.synthetic.external", 0.1),
];

/// Davis data units per entity
pub const DDU_METRIC: &str = "builtin:billing.ddu.metrics.byEntity";

/// Entity types DEM consumption is attributed to
pub const DEM_ENTITY_TYPES: &[&str] = &[
    "APPLICATION",
    "CUSTOM_APPLICATION",
    "MOBILE_APPLICATION",
    "HTTP_CHECK",
    "SYNTHETIC_TEST",
];
