//! Mock Bluetooth stack for testing

use super::protocol::{
    CLIENT_CONFIGURATION_UUID, DEVICE_INFORMATION_UUID, FIRMWARE_REVISION_UUID, NOTIFY_CHAR_UUID,
    SERVICE_UUID, WRITE_CHAR_UUID,
};
use super::transport::{
    BluetoothBackend, Characteristic, Descriptor, GattCentral, ServiceHandle, ServiceState,
    TransportError,
};
use crate::domain::models::{DeviceInfo, HostMode};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

#[derive(Default)]
struct CentralInner {
    name: String,
    address: u64,
    services: HashMap<Uuid, ServiceState>,
    characteristics: HashMap<(Uuid, Uuid), Vec<u8>>,
    descriptors: HashSet<(Uuid, Uuid)>,
    writes: Vec<(Uuid, Vec<u8>)>,
    descriptor_writes: Vec<(Uuid, Vec<u8>)>,
    detail_requests: Vec<Uuid>,
    connect_requests: usize,
    service_discovery_requests: usize,
    disconnects: usize,
    reject_writes: bool,
}

/// Mock GATT central; clones share state
#[derive(Clone, Default)]
pub struct MockCentral {
    inner: Arc<Mutex<CentralInner>>,
}

impl MockCentral {
    /// A central offering no services
    pub fn empty() -> Self {
        let central = Self::default();
        {
            let mut inner = central.inner.lock().unwrap();
            inner.name = "Evolution-Robot".to_string();
            inner.address = 0x00_00_C0_FF_EE_00_00_01;
        }
        central
    }

    /// A central offering both robot services, already discovered
    pub fn robot(firmware: &str) -> Self {
        Self::robot_with_state(firmware, ServiceState::ServiceDiscovered)
    }

    pub fn robot_with_state(firmware: &str, state: ServiceState) -> Self {
        let central = Self::empty();
        central.add_service(DEVICE_INFORMATION_UUID, state);
        central.add_service(SERVICE_UUID, state);
        central.add_characteristic(
            DEVICE_INFORMATION_UUID,
            FIRMWARE_REVISION_UUID,
            firmware.as_bytes(),
        );
        central.add_characteristic(SERVICE_UUID, NOTIFY_CHAR_UUID, &[]);
        central.add_characteristic(SERVICE_UUID, WRITE_CHAR_UUID, &[]);
        central.add_descriptor(NOTIFY_CHAR_UUID, CLIENT_CONFIGURATION_UUID);
        central
    }

    pub fn add_service(&self, service: Uuid, state: ServiceState) {
        self.inner.lock().unwrap().services.insert(service, state);
    }

    pub fn set_service_state(&self, service: Uuid, state: ServiceState) {
        self.add_service(service, state);
    }

    pub fn add_characteristic(&self, service: Uuid, uuid: Uuid, value: &[u8]) {
        self.inner
            .lock()
            .unwrap()
            .characteristics
            .insert((service, uuid), value.to_vec());
    }

    pub fn remove_characteristic(&self, service: Uuid, uuid: Uuid) {
        self.inner
            .lock()
            .unwrap()
            .characteristics
            .remove(&(service, uuid));
    }

    pub fn add_descriptor(&self, characteristic: Uuid, uuid: Uuid) {
        self.inner
            .lock()
            .unwrap()
            .descriptors
            .insert((characteristic, uuid));
    }

    pub fn reject_writes(&self, reject: bool) {
        self.inner.lock().unwrap().reject_writes = reject;
    }

    /// Values written to the write characteristic, oldest first
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.inner
            .lock()
            .unwrap()
            .writes
            .iter()
            .filter(|(uuid, _)| *uuid == WRITE_CHAR_UUID)
            .map(|(_, value)| value.clone())
            .collect()
    }

    pub fn last_write(&self) -> Option<Vec<u8>> {
        self.writes().pop()
    }

    pub fn descriptor_writes(&self) -> Vec<(Uuid, Vec<u8>)> {
        self.inner.lock().unwrap().descriptor_writes.clone()
    }

    pub fn detail_requests(&self) -> Vec<Uuid> {
        self.inner.lock().unwrap().detail_requests.clone()
    }

    pub fn connect_requests(&self) -> usize {
        self.inner.lock().unwrap().connect_requests
    }

    pub fn service_discovery_requests(&self) -> usize {
        self.inner.lock().unwrap().service_discovery_requests
    }

    pub fn disconnects(&self) -> usize {
        self.inner.lock().unwrap().disconnects
    }
}

impl GattCentral for MockCentral {
    fn remote_name(&self) -> String {
        self.inner.lock().unwrap().name.clone()
    }

    fn remote_address(&self) -> u64 {
        self.inner.lock().unwrap().address
    }

    fn connect_to_device(&mut self) -> Result<(), TransportError> {
        self.inner.lock().unwrap().connect_requests += 1;
        Ok(())
    }

    fn discover_services(&mut self) -> Result<(), TransportError> {
        self.inner.lock().unwrap().service_discovery_requests += 1;
        Ok(())
    }

    fn disconnect_from_device(&mut self) {
        self.inner.lock().unwrap().disconnects += 1;
    }

    fn create_service(&mut self, service: Uuid) -> Option<ServiceHandle> {
        let inner = self.inner.lock().unwrap();
        inner
            .services
            .contains_key(&service)
            .then(|| ServiceHandle::new(service))
    }

    fn service_state(&self, service: ServiceHandle) -> ServiceState {
        let inner = self.inner.lock().unwrap();
        inner
            .services
            .get(&service.uuid())
            .copied()
            .unwrap_or(ServiceState::InvalidService)
    }

    fn discover_details(&mut self, service: ServiceHandle) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();
        inner.detail_requests.push(service.uuid());
        inner
            .services
            .insert(service.uuid(), ServiceState::DiscoveringServices);
        Ok(())
    }

    fn characteristic(&self, service: ServiceHandle, uuid: Uuid) -> Option<Characteristic> {
        let inner = self.inner.lock().unwrap();
        inner
            .characteristics
            .get(&(service.uuid(), uuid))
            .map(|value| Characteristic {
                service: service.uuid(),
                uuid,
                value: value.clone(),
            })
    }

    fn descriptor(&self, characteristic: &Characteristic, uuid: Uuid) -> Option<Descriptor> {
        let inner = self.inner.lock().unwrap();
        inner
            .descriptors
            .contains(&(characteristic.uuid, uuid))
            .then(|| Descriptor {
                characteristic: characteristic.uuid,
                uuid,
            })
    }

    fn write_characteristic(
        &mut self,
        characteristic: &Characteristic,
        value: &[u8],
    ) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.reject_writes {
            return Err(TransportError::Rejected("write rejected".to_string()));
        }
        inner.writes.push((characteristic.uuid, value.to_vec()));
        Ok(())
    }

    fn write_descriptor(
        &mut self,
        descriptor: &Descriptor,
        value: &[u8],
    ) -> Result<(), TransportError> {
        self.inner
            .lock()
            .unwrap()
            .descriptor_writes
            .push((descriptor.characteristic, value.to_vec()));
        Ok(())
    }
}

struct BackendInner {
    adapter_valid: bool,
    host_mode: HostMode,
    discovery_active: bool,
    discovery_starts: usize,
    power_on_requests: usize,
    reject_discovery: bool,
    centrals_created: Vec<DeviceInfo>,
}

/// Mock adapter handing out clones of one [`MockCentral`]
#[derive(Clone)]
pub struct MockBackend {
    inner: Arc<Mutex<BackendInner>>,
    central: MockCentral,
}

impl MockBackend {
    pub fn new(central: MockCentral) -> Self {
        Self {
            inner: Arc::new(Mutex::new(BackendInner {
                adapter_valid: true,
                host_mode: HostMode::Connectable,
                discovery_active: false,
                discovery_starts: 0,
                power_on_requests: 0,
                reject_discovery: false,
                centrals_created: Vec::new(),
            })),
            central,
        }
    }

    pub fn without_adapter() -> Self {
        let backend = Self::new(MockCentral::empty());
        backend.inner.lock().unwrap().adapter_valid = false;
        backend
    }

    pub fn powered_off(central: MockCentral) -> Self {
        let backend = Self::new(central);
        backend.inner.lock().unwrap().host_mode = HostMode::PoweredOff;
        backend
    }

    pub fn set_host_mode(&self, mode: HostMode) {
        self.inner.lock().unwrap().host_mode = mode;
    }

    pub fn set_discovery_active(&self, active: bool) {
        self.inner.lock().unwrap().discovery_active = active;
    }

    pub fn reject_discovery(&self, reject: bool) {
        self.inner.lock().unwrap().reject_discovery = reject;
    }

    pub fn discovery_starts(&self) -> usize {
        self.inner.lock().unwrap().discovery_starts
    }

    pub fn power_on_requests(&self) -> usize {
        self.inner.lock().unwrap().power_on_requests
    }

    pub fn centrals_created(&self) -> Vec<DeviceInfo> {
        self.inner.lock().unwrap().centrals_created.clone()
    }

    pub fn central(&self) -> &MockCentral {
        &self.central
    }
}

impl BluetoothBackend for MockBackend {
    type Central = MockCentral;

    fn is_adapter_valid(&self) -> bool {
        self.inner.lock().unwrap().adapter_valid
    }

    fn host_mode(&self) -> HostMode {
        self.inner.lock().unwrap().host_mode
    }

    fn power_on(&mut self) {
        self.inner.lock().unwrap().power_on_requests += 1;
    }

    fn start_discovery(&mut self) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.reject_discovery {
            return Err(TransportError::Rejected("adapter busy".to_string()));
        }
        inner.discovery_starts += 1;
        inner.discovery_active = true;
        Ok(())
    }

    fn stop_discovery(&mut self) {
        self.inner.lock().unwrap().discovery_active = false;
    }

    fn is_discovery_active(&self) -> bool {
        self.inner.lock().unwrap().discovery_active
    }

    fn create_central(&mut self, device: &DeviceInfo) -> Self::Central {
        self.inner
            .lock()
            .unwrap()
            .centrals_created
            .push(device.clone());
        self.central.clone()
    }
}
