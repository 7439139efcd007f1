//! Store configuration

/// Engine configuration for one store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub store_id: String,
    pub work_dir: String,
    /// Prefix for receipt numbers (e.g. "FS-")
    pub receipt_prefix: String,
    /// Payment methods the finalizer accepts
    pub payment_methods: Vec<String>,
    pub event_channel_capacity: usize,
}

impl StoreConfig {
    pub fn from_env() -> Self {
        Self {
            store_id: std::env::var("STORE_ID").unwrap_or_else(|_| "store-default".into()),
            work_dir: std::env::var("WORK_DIR").unwrap_or_else(|_| "/var/lib/floor".into()),
            receipt_prefix: std::env::var("RECEIPT_PREFIX").unwrap_or_else(|_| "FS-".into()),
            payment_methods: std::env::var("PAYMENT_METHODS")
                .map(|v| {
                    v.split(',')
                        .map(|m| m.trim().to_string())
                        .filter(|m| !m.is_empty())
                        .collect()
                })
                .unwrap_or_else(|_| {
                    vec!["CASH".to_string(), "CARD".to_string(), "MOBILE".to_string()]
                }),
            event_channel_capacity: std::env::var("EVENT_CHANNEL_CAPACITY")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(65536),
        }
    }

    pub fn accepts_method(&self, method: &str) -> bool {
        self.payment_methods.iter().any(|m| m == method)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
