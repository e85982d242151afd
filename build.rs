fn main() {
    println!("cargo:rerun-if-env-changed=THERMONODE_WIFI_SSID");
    println!("cargo:rerun-if-env-changed=THERMONODE_WIFI_PASSWORD");
    println!("cargo:rerun-if-env-changed=THERMONODE_MQTT_URL");
    println!("cargo:rerun-if-env-changed=THERMONODE_MQTT_USER");
    println!("cargo:rerun-if-env-changed=THERMONODE_MQTT_PASSWORD");
    println!("cargo:rerun-if-env-changed=THERMONODE_MQTT_CLIENT_ID");

    // Host builds have no ESP-IDF toolchain to export.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
