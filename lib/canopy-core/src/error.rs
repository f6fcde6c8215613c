use thiserror::Error;

pub type Result<T> = std::result::Result<T, RouterError>;

/// Failures surfaced by router backends
#[derive(Error, Debug)]
pub enum RouterError {
    /// The balancer has no external address yet
    #[error("load balancer is not ready")]
    LoadBalancerNotReady,

    /// The app's balancer currently routes another app's traffic
    #[error("app {app} currently swapped with {dst_app}")]
    AppSwapped { app: String, dst_app: String },

    /// The app has no web service to mirror
    #[error("no web service found for app {0}")]
    NoWebService(String),

    /// Swapping apps across namespaces is unsupported
    #[error("unable to swap apps with different namespaces: {src} != {dst}")]
    CrossNamespaceSwap { src: String, dst: String },

    /// The second write of a swap failed and so did the compensating write
    #[error("failed to rollback swap {original}: {rollback}")]
    SwapRollback {
        original: Box<RouterError>,
        rollback: Box<RouterError>,
    },

    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RouterError {
    /// Whether this failure is the cluster's distinguishable not-found
    pub fn is_not_found(&self) -> bool {
        matches!(self, RouterError::Kube(kube::Error::Api(response)) if response.code == 404)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::ErrorResponse;

    fn kube_status(code: u16) -> RouterError {
        RouterError::Kube(kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: "test".to_string(),
            reason: String::new(),
            code,
        }))
    }

    #[test]
    fn test_is_not_found() {
        assert!(kube_status(404).is_not_found());
        assert!(!kube_status(409).is_not_found());
        assert!(!RouterError::LoadBalancerNotReady.is_not_found());
        assert!(!RouterError::NoWebService("myapp".to_string()).is_not_found());
    }

    #[test]
    fn test_swap_rollback_reports_both_failures() {
        let err = RouterError::SwapRollback {
            original: Box::new(kube_status(500)),
            rollback: Box::new(RouterError::LoadBalancerNotReady),
        };
        let text = err.to_string();
        assert!(text.contains("failed to rollback swap"));
        assert!(text.contains("load balancer is not ready"));
    }

    #[test]
    fn test_app_swapped_names_peer() {
        let err = RouterError::AppSwapped {
            app: "blue".to_string(),
            dst_app: "green".to_string(),
        };
        assert_eq!(err.to_string(), "app blue currently swapped with green");
    }
}
