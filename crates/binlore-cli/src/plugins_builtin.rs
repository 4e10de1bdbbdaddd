//! Registers the compiled-in plugins ("two directories: user,
//! system" — the system directory is these built-ins; there is no dynamic
//! loading in this port).

use binlore_sig::PluginBus;

#[must_use]
pub fn default_plugin_bus() -> PluginBus {
    let mut bus = PluginBus::new();
    bus.register(Box::new(binlore_plugins::CpioPlugin::new()));
    bus.register(Box::new(binlore_plugins::Jffs2ValidPlugin::new()));
    bus.register(Box::new(binlore_plugins::UbiValidPlugin::new()));
    bus.register(Box::new(binlore_plugins::LzmaValidPlugin::new()));
    bus.register(Box::new(binlore_plugins::ZlibValidPlugin::new()));
    bus.register(Box::new(binlore_plugins::GzipValidPlugin::new()));
    bus
}
