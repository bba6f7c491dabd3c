//! BlueZ D-Bus proxies.
//!
//! Service: `org.bluez` on the system bus.

use std::collections::HashMap;

use tracing::debug;
use zbus::zvariant::{ObjectPath, OwnedObjectPath, Value};
use zbus::{proxy, Connection};

use crate::error::{Result, TransportError};

pub const BLUEZ_SERVICE: &str = "org.bluez";
pub const ADAPTER_INTERFACE: &str = "org.bluez.Adapter1";

/// D-Bus error BlueZ returns when unregistering an unknown profile.
pub const ERROR_DOES_NOT_EXIST: &str = "org.bluez.Error.DoesNotExist";

#[proxy(
    interface = "org.bluez.ProfileManager1",
    default_service = "org.bluez",
    default_path = "/org/bluez"
)]
pub trait ProfileManager1 {
    fn register_profile(
        &self,
        profile: &ObjectPath<'_>,
        uuid: &str,
        options: HashMap<&str, Value<'_>>,
    ) -> zbus::Result<()>;

    fn unregister_profile(&self, profile: &ObjectPath<'_>) -> zbus::Result<()>;
}

#[proxy(interface = "org.bluez.Adapter1", default_service = "org.bluez")]
pub trait Adapter1 {
    #[zbus(property)]
    fn address(&self) -> zbus::Result<String>;

    #[zbus(property)]
    fn powered(&self) -> zbus::Result<bool>;
    #[zbus(property)]
    fn set_powered(&self, value: bool) -> zbus::Result<()>;

    #[zbus(property)]
    fn discoverable(&self) -> zbus::Result<bool>;
    #[zbus(property)]
    fn set_discoverable(&self, value: bool) -> zbus::Result<()>;

    #[zbus(property)]
    fn pairable(&self) -> zbus::Result<bool>;
    #[zbus(property)]
    fn set_pairable(&self, value: bool) -> zbus::Result<()>;

    #[zbus(property)]
    fn alias(&self) -> zbus::Result<String>;
    #[zbus(property)]
    fn set_alias(&self, value: &str) -> zbus::Result<()>;
}

/// Locate the default adapter: the lowest object path exposing `Adapter1`.
pub async fn find_adapter(conn: &Connection) -> Result<OwnedObjectPath> {
    let manager = zbus::fdo::ObjectManagerProxy::builder(conn)
        .destination(BLUEZ_SERVICE)?
        .path("/")?
        .build()
        .await?;
    let objects = manager.get_managed_objects().await?;

    let mut adapters: Vec<OwnedObjectPath> = objects
        .into_iter()
        .filter(|(_, interfaces)| {
            interfaces
                .keys()
                .any(|name| name.as_str() == ADAPTER_INTERFACE)
        })
        .map(|(path, _)| path)
        .collect();
    adapters.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    debug!("Adapters: {:?}", adapters);

    adapters.into_iter().next().ok_or(TransportError::NoAdapter)
}

/// Power the adapter on and make it discoverable and pairable under `alias`.
pub async fn prepare_adapter(adapter: &Adapter1Proxy<'_>, alias: &str) -> Result<()> {
    adapter.set_powered(true).await?;
    adapter.set_alias(alias).await?;
    adapter.set_discoverable(true).await?;
    adapter.set_pairable(true).await?;
    Ok(())
}

/// Whether a D-Bus error is BlueZ reporting an unknown object.
pub fn is_does_not_exist(err: &zbus::Error) -> bool {
    match err {
        zbus::Error::MethodError(name, _, _) => is_does_not_exist_name(name.as_str()),
        _ => false,
    }
}

/// Whether a D-Bus error name is BlueZ's unknown-object error.
pub fn is_does_not_exist_name(name: &str) -> bool {
    name == ERROR_DOES_NOT_EXIST
}
