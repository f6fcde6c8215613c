//! Well-known label keys stamped on routed Services

/// Name of the application that owns a resource
pub const APP_LABEL: &str = "canopy.dev/app-name";

/// Pool the owning application is scheduled on
pub const APP_POOL_LABEL: &str = "canopy.dev/app-pool";

/// Process an app service fronts ("web" is the routable one)
pub const APP_PROCESS_LABEL: &str = "canopy.dev/app-process";

/// Marks Services created and managed by this router
pub const MANAGED_SERVICE_LABEL: &str = "canopy.dev/router-lb";

/// Holds the peer app name while two balancers are swapped
pub const SWAP_LABEL: &str = "canopy.dev/swapped-with";

/// Process name the router mirrors traffic to
pub const WEB_PROCESS_NAME: &str = "web";
