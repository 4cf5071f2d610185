//! Providers that fabricate records locally without touching the network.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tracing::debug;

use super::{
    connect_url, unix_seconds, AccountLinker, ConnectLink, FollowerOrder, FollowerSeller, PhoneActivation,
    PhoneNumberProvider, ProviderError,
};

/// Call counter plus an optional forced failure, shared by every simulator.
#[derive(Default)]
struct Rehearsal {
    calls: AtomicUsize,
    failing: AtomicBool,
}

impl Rehearsal {
    fn enter(&self, who: &str) -> Result<(), ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(ProviderError::Api(format!("{who} simulated outage")));
        }
        Ok(())
    }
}

macro_rules! rehearsal_accessors {
    ($ty:ty) => {
        impl $ty {
            /// Make every later call fail (or succeed again).
            pub fn set_failing(&self, failing: bool) {
                self.rehearsal.failing.store(failing, Ordering::SeqCst);
            }

            /// Number of calls received, failed ones included.
            pub fn calls(&self) -> usize {
                self.rehearsal.calls.load(Ordering::SeqCst)
            }
        }
    };
}

#[derive(Default)]
pub struct SimulatedApex {
    rehearsal: Rehearsal,
}

impl SimulatedApex {
    pub fn new() -> Self {
        Self::default()
    }
}

rehearsal_accessors!(SimulatedApex);

#[async_trait]
impl FollowerSeller for SimulatedApex {
    async fn buy_followers(&self, service: &str, quantity: u32, link: &str) -> Result<FollowerOrder, ProviderError> {
        self.rehearsal.enter("Apex")?;
        debug!("Simulated Apex order: service={service} quantity={quantity} link={link}");
        Ok(FollowerOrder {
            order_id: format!("APX-{}", unix_seconds()),
            status: "success".to_string(),
            quantity,
            link: link.to_string(),
        })
    }
}

#[derive(Default)]
pub struct SimulatedSmsActivate {
    rehearsal: Rehearsal,
}

impl SimulatedSmsActivate {
    pub fn new() -> Self {
        Self::default()
    }
}

rehearsal_accessors!(SimulatedSmsActivate);

#[async_trait]
impl PhoneNumberProvider for SimulatedSmsActivate {
    async fn buy_number(&self, country: &str, service: &str) -> Result<PhoneActivation, ProviderError> {
        self.rehearsal.enter("SMS-Activate")?;
        debug!("Simulated SMS-Activate number: country={country} service={service}");
        let now = unix_seconds();
        Ok(PhoneActivation {
            activation_id: format!("SMS-{now}"),
            phone_number: format!("+5511{}", now % 100_000_000),
            status: "success".to_string(),
        })
    }
}

pub struct SimulatedPluggy {
    client_id: String,
    rehearsal: Rehearsal,
}

impl SimulatedPluggy {
    pub fn new(client_id: String) -> Self {
        Self { client_id, rehearsal: Rehearsal::default() }
    }
}

rehearsal_accessors!(SimulatedPluggy);

#[async_trait]
impl AccountLinker for SimulatedPluggy {
    async fn connect_link(&self, user_id: i64) -> Result<ConnectLink, ProviderError> {
        self.rehearsal.enter("Pluggy")?;
        let connect_token = format!("pluggy_token_{user_id}_{}", unix_seconds());
        Ok(ConnectLink {
            url: connect_url(&self.client_id, &connect_token),
            connect_token,
        })
    }
}
