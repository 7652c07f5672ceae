//! Vendor-neutral layer 2 operations and their cached front end.
//!
//! Vendor drivers implement [`L2Api`] by turning each operation into CLI
//! commands on a [`CommandExecutor`](crate::driver::CommandExecutor) and
//! parsing the transcripts back. Every operation has a default that
//! reports [`DriverError::Unsupported`], so a driver only implements what
//! its hardware can do.
//!
//! [`CachedL2Api`] wraps any driver and routes every operation through an
//! [`AutoCache`] configured with [`default_operation_table`].

use std::future::Future;
use std::time::Duration;

use indexmap::IndexMap;

use crate::cache::{AutoCache, CacheKey, Cacheable, OperationTable};
use crate::error::{DriverError, Result};

/// Structured result of a `show_*` operation, keyed by object id.
pub type Records = IndexMap<String, serde_json::Value>;

/// Operation names, as used in [`OperationTable`]s.
pub mod op {
    pub const DUMP_CONFIG: &str = "dump_config";
    pub const SAVE_CONFIG: &str = "save_config";
    pub const SHOW_SYSTEM: &str = "show_system";
    pub const SHOW_HOSTNAME: &str = "show_hostname";
    pub const SHOW_VERSION: &str = "show_version";
    pub const SHOW_INTERFACES: &str = "show_interfaces";
    pub const SHOW_LLDP: &str = "show_lldp";
    pub const SHOW_ARP: &str = "show_arp";
    pub const SHOW_UPLINKS: &str = "show_uplinks";
    pub const SHOW_VLANS: &str = "show_vlans";
    pub const SHOW_LAGS: &str = "show_lags";
    pub const CREATE_VLAN: &str = "create_vlan";
    pub const CREATE_LAG: &str = "create_lag";
    pub const ENABLE_INTERFACE: &str = "enable_interface";
    pub const ENABLE_VLAN: &str = "enable_vlan";
    pub const ENABLE_LAG: &str = "enable_lag";
    pub const DISABLE_INTERFACE: &str = "disable_interface";
    pub const DISABLE_VLAN: &str = "disable_vlan";
    pub const DISABLE_LAG: &str = "disable_lag";
    pub const CHANGE_INTERFACE_DESCRIPTION: &str = "change_interface_description";
    pub const CHANGE_VLAN_DESCRIPTION: &str = "change_vlan_description";
    pub const CHANGE_LAG_DESCRIPTION: &str = "change_lag_description";
    pub const DESTROY_VLAN: &str = "destroy_vlan";
    pub const DESTROY_LAG: &str = "destroy_lag";
    pub const INTERFACE_ATTACH_VLAN: &str = "interface_attach_vlan";
    pub const INTERFACE_DETACH_VLAN: &str = "interface_detach_vlan";
    pub const LAG_ATTACH_VLAN: &str = "lag_attach_vlan";
    pub const LAG_DETACH_VLAN: &str = "lag_detach_vlan";
    pub const LAG_ATTACH_INTERFACE: &str = "lag_attach_interface";
    pub const LAG_DETACH_INTERFACE: &str = "lag_detach_interface";
}

fn unsupported<T: Send>(operation: &'static str) -> impl Future<Output = Result<T>> + Send {
    std::future::ready(Err(DriverError::Unsupported { operation }.into()))
}

/// Layer 2 operations on one switch.
///
/// `show_*` operations taking an optional id return the whole collection
/// for `None` and a single-entry collection otherwise.
pub trait L2Api: Send {
    /// Running configuration as text.
    fn dump_config(&mut self) -> impl Future<Output = Result<String>> + Send {
        unsupported(op::DUMP_CONFIG)
    }

    /// Persist the running configuration.
    fn save_config(&mut self) -> impl Future<Output = Result<()>> + Send {
        unsupported(op::SAVE_CONFIG)
    }

    fn show_system(&mut self) -> impl Future<Output = Result<Records>> + Send {
        unsupported(op::SHOW_SYSTEM)
    }

    fn show_hostname(&mut self) -> impl Future<Output = Result<String>> + Send {
        unsupported(op::SHOW_HOSTNAME)
    }

    fn show_version(&mut self) -> impl Future<Output = Result<Records>> + Send {
        unsupported(op::SHOW_VERSION)
    }

    fn show_interfaces(
        &mut self,
        _interface_id: Option<&str>,
    ) -> impl Future<Output = Result<Records>> + Send {
        unsupported(op::SHOW_INTERFACES)
    }

    /// LLDP neighbours, per local interface.
    fn show_lldp(
        &mut self,
        _interface_id: Option<&str>,
    ) -> impl Future<Output = Result<Records>> + Send {
        unsupported(op::SHOW_LLDP)
    }

    /// ARP table, per interface.
    fn show_arp(
        &mut self,
        _interface_id: Option<&str>,
    ) -> impl Future<Output = Result<Records>> + Send {
        unsupported(op::SHOW_ARP)
    }

    /// Interfaces facing other switches.
    fn show_uplinks(&mut self) -> impl Future<Output = Result<Records>> + Send {
        unsupported(op::SHOW_UPLINKS)
    }

    fn show_vlans(&mut self, _vlan_id: Option<u16>) -> impl Future<Output = Result<Records>> + Send {
        unsupported(op::SHOW_VLANS)
    }

    fn show_lags(&mut self, _lag_id: Option<u16>) -> impl Future<Output = Result<Records>> + Send {
        unsupported(op::SHOW_LAGS)
    }

    fn create_vlan(
        &mut self,
        _vlan_id: u16,
        _description: Option<&str>,
    ) -> impl Future<Output = Result<()>> + Send {
        unsupported(op::CREATE_VLAN)
    }

    fn create_lag(
        &mut self,
        _lag_id: u16,
        _description: Option<&str>,
    ) -> impl Future<Output = Result<()>> + Send {
        unsupported(op::CREATE_LAG)
    }

    fn enable_interface(&mut self, _interface_id: &str) -> impl Future<Output = Result<()>> + Send {
        unsupported(op::ENABLE_INTERFACE)
    }

    fn enable_vlan(&mut self, _vlan_id: u16) -> impl Future<Output = Result<()>> + Send {
        unsupported(op::ENABLE_VLAN)
    }

    fn enable_lag(&mut self, _lag_id: u16) -> impl Future<Output = Result<()>> + Send {
        unsupported(op::ENABLE_LAG)
    }

    fn disable_interface(&mut self, _interface_id: &str) -> impl Future<Output = Result<()>> + Send {
        unsupported(op::DISABLE_INTERFACE)
    }

    fn disable_vlan(&mut self, _vlan_id: u16) -> impl Future<Output = Result<()>> + Send {
        unsupported(op::DISABLE_VLAN)
    }

    fn disable_lag(&mut self, _lag_id: u16) -> impl Future<Output = Result<()>> + Send {
        unsupported(op::DISABLE_LAG)
    }

    fn change_interface_description(
        &mut self,
        _interface_id: &str,
        _description: &str,
    ) -> impl Future<Output = Result<()>> + Send {
        unsupported(op::CHANGE_INTERFACE_DESCRIPTION)
    }

    fn change_vlan_description(
        &mut self,
        _vlan_id: u16,
        _description: &str,
    ) -> impl Future<Output = Result<()>> + Send {
        unsupported(op::CHANGE_VLAN_DESCRIPTION)
    }

    fn change_lag_description(
        &mut self,
        _lag_id: u16,
        _description: &str,
    ) -> impl Future<Output = Result<()>> + Send {
        unsupported(op::CHANGE_LAG_DESCRIPTION)
    }

    fn destroy_vlan(&mut self, _vlan_id: u16) -> impl Future<Output = Result<()>> + Send {
        unsupported(op::DESTROY_VLAN)
    }

    fn destroy_lag(&mut self, _lag_id: u16) -> impl Future<Output = Result<()>> + Send {
        unsupported(op::DESTROY_LAG)
    }

    fn interface_attach_vlan(
        &mut self,
        _interface_id: &str,
        _vlan_id: u16,
        _tagged: bool,
    ) -> impl Future<Output = Result<()>> + Send {
        unsupported(op::INTERFACE_ATTACH_VLAN)
    }

    fn interface_detach_vlan(
        &mut self,
        _interface_id: &str,
        _vlan_id: u16,
        _tagged: bool,
    ) -> impl Future<Output = Result<()>> + Send {
        unsupported(op::INTERFACE_DETACH_VLAN)
    }

    fn lag_attach_vlan(
        &mut self,
        _lag_id: u16,
        _vlan_id: u16,
        _tagged: bool,
    ) -> impl Future<Output = Result<()>> + Send {
        unsupported(op::LAG_ATTACH_VLAN)
    }

    fn lag_detach_vlan(
        &mut self,
        _lag_id: u16,
        _vlan_id: u16,
        _tagged: bool,
    ) -> impl Future<Output = Result<()>> + Send {
        unsupported(op::LAG_DETACH_VLAN)
    }

    fn lag_attach_interface(
        &mut self,
        _lag_id: u16,
        _interface_id: &str,
    ) -> impl Future<Output = Result<()>> + Send {
        unsupported(op::LAG_ATTACH_INTERFACE)
    }

    fn lag_detach_interface(
        &mut self,
        _lag_id: u16,
        _interface_id: &str,
    ) -> impl Future<Output = Result<()>> + Send {
        unsupported(op::LAG_DETACH_INTERFACE)
    }
}

/// Cache policy for [`L2Api`] operations.
///
/// System facts live for five minutes, everything else for one. Each
/// collection is cleared by the operations that change it.
pub fn default_operation_table() -> OperationTable {
    let system = Duration::from_secs(300);
    let state = Duration::from_secs(60);

    OperationTable::new()
        .cacheable(op::SHOW_SYSTEM, system, &[])
        .cacheable(op::SHOW_HOSTNAME, system, &[])
        .cacheable(op::SHOW_VERSION, system, &[])
        .cacheable(
            op::SHOW_INTERFACES,
            state,
            &[
                op::ENABLE_INTERFACE,
                op::DISABLE_INTERFACE,
                op::CHANGE_INTERFACE_DESCRIPTION,
                op::INTERFACE_ATTACH_VLAN,
                op::INTERFACE_DETACH_VLAN,
                op::LAG_ATTACH_INTERFACE,
                op::LAG_DETACH_INTERFACE,
            ],
        )
        .cacheable(op::SHOW_LLDP, state, &[])
        .cacheable(op::SHOW_ARP, state, &[])
        .cacheable(op::SHOW_UPLINKS, state, &[])
        .cacheable(
            op::SHOW_VLANS,
            state,
            &[
                op::CREATE_VLAN,
                op::DESTROY_VLAN,
                op::ENABLE_VLAN,
                op::DISABLE_VLAN,
                op::CHANGE_VLAN_DESCRIPTION,
                op::INTERFACE_ATTACH_VLAN,
                op::INTERFACE_DETACH_VLAN,
                op::LAG_ATTACH_VLAN,
                op::LAG_DETACH_VLAN,
            ],
        )
        .cacheable(
            op::SHOW_LAGS,
            state,
            &[
                op::CREATE_LAG,
                op::DESTROY_LAG,
                op::ENABLE_LAG,
                op::DISABLE_LAG,
                op::CHANGE_LAG_DESCRIPTION,
                op::LAG_ATTACH_INTERFACE,
                op::LAG_DETACH_INTERFACE,
                op::LAG_ATTACH_VLAN,
                op::LAG_DETACH_VLAN,
            ],
        )
}

/// An [`L2Api`] driver behind a result cache.
///
/// Read operations take a `use_cache` override: `Some(false)` always asks
/// the device, `Some(true)` always consults the cache, `None` follows the
/// instance default (on unless changed with
/// [`use_cache_by_default`](Self::use_cache_by_default)). Write operations
/// always reach the device and, when they succeed, discard the cached
/// collections they change.
#[derive(Debug)]
pub struct CachedL2Api<D> {
    driver: D,
    cache: AutoCache,
}

impl<D: L2Api> CachedL2Api<D> {
    /// Wrap `driver` with the default operation table.
    pub fn new(driver: D) -> Self {
        Self::with_table(driver, default_operation_table())
    }

    pub fn with_table(driver: D, table: OperationTable) -> Self {
        Self {
            driver,
            cache: AutoCache::new(table),
        }
    }

    pub fn use_cache_by_default(mut self, use_cache: bool) -> Self {
        self.cache = self.cache.with_default(use_cache);
        self
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Direct access to the driver. Calls made here bypass the cache.
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    pub fn cache(&self) -> &AutoCache {
        &self.cache
    }

    /// Discard every cached result.
    pub fn clear_cache(&self) {
        self.cache.clear_cache();
    }

    pub fn into_inner(self) -> D {
        self.driver
    }

    async fn call<'a, V, F, Fut>(
        &'a mut self,
        operation: &'static str,
        key: CacheKey,
        use_cache: Option<bool>,
        call: F,
    ) -> Result<V>
    where
        V: Cacheable,
        F: FnOnce(&'a mut D) -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        let Self { driver, cache } = self;
        cache.invoke(operation, key, use_cache, move || call(driver)).await
    }

    pub async fn dump_config(&mut self) -> Result<String> {
        self.call(op::DUMP_CONFIG, CacheKey::All, None, |d| d.dump_config())
            .await
    }

    pub async fn save_config(&mut self) -> Result<()> {
        self.call(op::SAVE_CONFIG, CacheKey::All, None, |d| d.save_config())
            .await
    }

    pub async fn show_system(&mut self, use_cache: Option<bool>) -> Result<Records> {
        self.call(op::SHOW_SYSTEM, CacheKey::All, use_cache, |d| d.show_system())
            .await
    }

    pub async fn show_hostname(&mut self, use_cache: Option<bool>) -> Result<String> {
        self.call(op::SHOW_HOSTNAME, CacheKey::All, use_cache, |d| {
            d.show_hostname()
        })
        .await
    }

    pub async fn show_version(&mut self, use_cache: Option<bool>) -> Result<Records> {
        self.call(op::SHOW_VERSION, CacheKey::All, use_cache, |d| d.show_version())
            .await
    }

    pub async fn show_interfaces(
        &mut self,
        interface_id: Option<&str>,
        use_cache: Option<bool>,
    ) -> Result<Records> {
        let key = CacheKey::from_option(interface_id);
        self.call(op::SHOW_INTERFACES, key, use_cache, move |d| {
            d.show_interfaces(interface_id)
        })
        .await
    }

    pub async fn show_lldp(
        &mut self,
        interface_id: Option<&str>,
        use_cache: Option<bool>,
    ) -> Result<Records> {
        let key = CacheKey::from_option(interface_id);
        self.call(op::SHOW_LLDP, key, use_cache, move |d| d.show_lldp(interface_id))
            .await
    }

    pub async fn show_arp(
        &mut self,
        interface_id: Option<&str>,
        use_cache: Option<bool>,
    ) -> Result<Records> {
        let key = CacheKey::from_option(interface_id);
        self.call(op::SHOW_ARP, key, use_cache, move |d| d.show_arp(interface_id))
            .await
    }

    pub async fn show_uplinks(&mut self, use_cache: Option<bool>) -> Result<Records> {
        self.call(op::SHOW_UPLINKS, CacheKey::All, use_cache, |d| d.show_uplinks())
            .await
    }

    pub async fn show_vlans(
        &mut self,
        vlan_id: Option<u16>,
        use_cache: Option<bool>,
    ) -> Result<Records> {
        let key = CacheKey::from_option(vlan_id);
        self.call(op::SHOW_VLANS, key, use_cache, move |d| d.show_vlans(vlan_id))
            .await
    }

    pub async fn show_lags(
        &mut self,
        lag_id: Option<u16>,
        use_cache: Option<bool>,
    ) -> Result<Records> {
        let key = CacheKey::from_option(lag_id);
        self.call(op::SHOW_LAGS, key, use_cache, move |d| d.show_lags(lag_id))
            .await
    }

    pub async fn create_vlan(&mut self, vlan_id: u16, description: Option<&str>) -> Result<()> {
        self.call(op::CREATE_VLAN, CacheKey::item(vlan_id), None, move |d| {
            d.create_vlan(vlan_id, description)
        })
        .await
    }

    pub async fn create_lag(&mut self, lag_id: u16, description: Option<&str>) -> Result<()> {
        self.call(op::CREATE_LAG, CacheKey::item(lag_id), None, move |d| {
            d.create_lag(lag_id, description)
        })
        .await
    }

    pub async fn enable_interface(&mut self, interface_id: &str) -> Result<()> {
        self.call(op::ENABLE_INTERFACE, CacheKey::item(interface_id), None, move |d| {
            d.enable_interface(interface_id)
        })
        .await
    }

    pub async fn enable_vlan(&mut self, vlan_id: u16) -> Result<()> {
        self.call(op::ENABLE_VLAN, CacheKey::item(vlan_id), None, move |d| {
            d.enable_vlan(vlan_id)
        })
        .await
    }

    pub async fn enable_lag(&mut self, lag_id: u16) -> Result<()> {
        self.call(op::ENABLE_LAG, CacheKey::item(lag_id), None, move |d| {
            d.enable_lag(lag_id)
        })
        .await
    }

    pub async fn disable_interface(&mut self, interface_id: &str) -> Result<()> {
        self.call(op::DISABLE_INTERFACE, CacheKey::item(interface_id), None, move |d| {
            d.disable_interface(interface_id)
        })
        .await
    }

    pub async fn disable_vlan(&mut self, vlan_id: u16) -> Result<()> {
        self.call(op::DISABLE_VLAN, CacheKey::item(vlan_id), None, move |d| {
            d.disable_vlan(vlan_id)
        })
        .await
    }

    pub async fn disable_lag(&mut self, lag_id: u16) -> Result<()> {
        self.call(op::DISABLE_LAG, CacheKey::item(lag_id), None, move |d| {
            d.disable_lag(lag_id)
        })
        .await
    }

    pub async fn change_interface_description(
        &mut self,
        interface_id: &str,
        description: &str,
    ) -> Result<()> {
        let key = CacheKey::item(interface_id);
        self.call(op::CHANGE_INTERFACE_DESCRIPTION, key, None, move |d| {
            d.change_interface_description(interface_id, description)
        })
        .await
    }

    pub async fn change_vlan_description(&mut self, vlan_id: u16, description: &str) -> Result<()> {
        let key = CacheKey::item(vlan_id);
        self.call(op::CHANGE_VLAN_DESCRIPTION, key, None, move |d| {
            d.change_vlan_description(vlan_id, description)
        })
        .await
    }

    pub async fn change_lag_description(&mut self, lag_id: u16, description: &str) -> Result<()> {
        let key = CacheKey::item(lag_id);
        self.call(op::CHANGE_LAG_DESCRIPTION, key, None, move |d| {
            d.change_lag_description(lag_id, description)
        })
        .await
    }

    pub async fn destroy_vlan(&mut self, vlan_id: u16) -> Result<()> {
        self.call(op::DESTROY_VLAN, CacheKey::item(vlan_id), None, move |d| {
            d.destroy_vlan(vlan_id)
        })
        .await
    }

    pub async fn destroy_lag(&mut self, lag_id: u16) -> Result<()> {
        self.call(op::DESTROY_LAG, CacheKey::item(lag_id), None, move |d| {
            d.destroy_lag(lag_id)
        })
        .await
    }

    pub async fn interface_attach_vlan(
        &mut self,
        interface_id: &str,
        vlan_id: u16,
        tagged: bool,
    ) -> Result<()> {
        let key = CacheKey::item(interface_id);
        self.call(op::INTERFACE_ATTACH_VLAN, key, None, move |d| {
            d.interface_attach_vlan(interface_id, vlan_id, tagged)
        })
        .await
    }

    pub async fn interface_detach_vlan(
        &mut self,
        interface_id: &str,
        vlan_id: u16,
        tagged: bool,
    ) -> Result<()> {
        let key = CacheKey::item(interface_id);
        self.call(op::INTERFACE_DETACH_VLAN, key, None, move |d| {
            d.interface_detach_vlan(interface_id, vlan_id, tagged)
        })
        .await
    }

    pub async fn lag_attach_vlan(&mut self, lag_id: u16, vlan_id: u16, tagged: bool) -> Result<()> {
        self.call(op::LAG_ATTACH_VLAN, CacheKey::item(lag_id), None, move |d| {
            d.lag_attach_vlan(lag_id, vlan_id, tagged)
        })
        .await
    }

    pub async fn lag_detach_vlan(&mut self, lag_id: u16, vlan_id: u16, tagged: bool) -> Result<()> {
        self.call(op::LAG_DETACH_VLAN, CacheKey::item(lag_id), None, move |d| {
            d.lag_detach_vlan(lag_id, vlan_id, tagged)
        })
        .await
    }

    pub async fn lag_attach_interface(&mut self, lag_id: u16, interface_id: &str) -> Result<()> {
        self.call(op::LAG_ATTACH_INTERFACE, CacheKey::item(lag_id), None, move |d| {
            d.lag_attach_interface(lag_id, interface_id)
        })
        .await
    }

    pub async fn lag_detach_interface(&mut self, lag_id: u16, interface_id: &str) -> Result<()> {
        self.call(op::LAG_DETACH_INTERFACE, CacheKey::item(lag_id), None, move |d| {
            d.lag_detach_interface(lag_id, interface_id)
        })
        .await
    }
}
