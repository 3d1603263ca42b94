use core::cell::RefCell;

use embassy_sync::blocking_mutex::{Mutex, raw::RawMutex};
use embedded_hal::i2c::{ErrorType, I2c, Operation, SevenBitAddress};

/// One physical I2C bus shared by several drivers.
///
/// Each driver gets its own [`BusDevice`]; every transfer made through a
/// device holds the bus lock for exactly that transfer, so transfers from
/// different devices never interleave on the wire.
pub struct SharedBus<M: RawMutex, BUS> {
    bus: Mutex<M, RefCell<BUS>>,
}

impl<M: RawMutex, BUS> SharedBus<M, BUS> {
    pub const fn new(bus: BUS) -> Self {
        Self {
            bus: Mutex::new(RefCell::new(bus)),
        }
    }

    /// Hands out a device view of the bus. `tag` only shows up in the logs.
    pub fn device(&self, tag: &'static str) -> BusDevice<'_, M, BUS> {
        BusDevice { bus: &self.bus, tag }
    }

    pub fn into_inner(self) -> BUS {
        self.bus.into_inner().into_inner()
    }
}

pub struct BusDevice<'a, M: RawMutex, BUS> {
    bus: &'a Mutex<M, RefCell<BUS>>,
    tag: &'static str,
}

impl<M: RawMutex, BUS> BusDevice<'_, M, BUS> {
    fn acquire<R>(&self, action: impl FnOnce(&mut BUS) -> R) -> R {
        trace!("Bus[{}] acquire ..", self.tag);
        let result = self.bus.lock(|cell| {
            trace!("Bus[{}] .. acquired", self.tag);
            let mut bus = cell.borrow_mut();
            action(&mut bus)
        });
        trace!("Bus[{}] .. released", self.tag);
        result
    }
}

impl<M: RawMutex, BUS: ErrorType> ErrorType for BusDevice<'_, M, BUS> {
    type Error = BUS::Error;
}

impl<M: RawMutex, BUS: I2c> I2c for BusDevice<'_, M, BUS> {
    fn read(&mut self, address: SevenBitAddress, read: &mut [u8]) -> Result<(), Self::Error> {
        self.acquire(|bus| bus.read(address, read))
    }

    fn write(&mut self, address: SevenBitAddress, write: &[u8]) -> Result<(), Self::Error> {
        self.acquire(|bus| bus.write(address, write))
    }

    fn write_read(&mut self, address: SevenBitAddress, write: &[u8], read: &mut [u8]) -> Result<(), Self::Error> {
        self.acquire(|bus| bus.write_read(address, write, read))
    }

    fn transaction(&mut self, address: SevenBitAddress, operations: &mut [Operation<'_>]) -> Result<(), Self::Error> {
        self.acquire(|bus| bus.transaction(address, operations))
    }
}


#[cfg(test)]
pub mod tests {
    use embassy_sync::blocking_mutex::raw::{CriticalSectionRawMutex, NoopRawMutex};
    use embedded_hal::i2c::{ErrorKind, I2c};
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};

    use super::mocks::{BusEvent, RecordingBus};
    use super::*;

    #[test]
    fn device_forwards_write_read_unchanged() {
        let expectations = [
            I2cTransaction::write_read(0x29, vec![0x01, 0x0F], vec![0xEA, 0xCC]),
            I2cTransaction::write(0x76, vec![0xF4, 0x27]),
        ];
        let mut mock = I2cMock::new(&expectations);
        let bus = SharedBus::<NoopRawMutex, _>::new(mock.clone());

        let mut ranger = bus.device("vl53l1x");
        let mut barometer = bus.device("bmp280");
        let mut id = [0u8; 2];
        ranger.write_read(0x29, &[0x01, 0x0F], &mut id).unwrap();
        barometer.write(0x76, &[0xF4, 0x27]).unwrap();

        assert_eq!(id, [0xEA, 0xCC]);
        mock.done();
    }

    #[test]
    fn lock_is_released_after_error() {
        let bus = SharedBus::<NoopRawMutex, _>::new(RecordingBus {
            fail_address: Some(0x29),
            ..Default::default()
        });
        let mut failing = bus.device("failing");
        let mut healthy = bus.device("healthy");

        assert!(failing.write(0x29, &[0x00]).is_err());
        assert!(healthy.write(0x30, &[0x01]).is_ok());

        let events = bus.into_inner().events;
        assert_eq!(events.last(), Some(&BusEvent::Stop(0x30)));
    }

    #[test]
    fn error_kind_passes_through() {
        let expectations = [I2cTransaction::write(0x29, vec![0x00, 0x00, 0x01]).with_error(ErrorKind::Other)];
        let mut mock = I2cMock::new(&expectations);
        let bus = SharedBus::<NoopRawMutex, _>::new(mock.clone());

        let result = bus.device("vl53l1x").write(0x29, &[0x00, 0x00, 0x01]);

        assert_eq!(result, Err(ErrorKind::Other));
        mock.done();
    }

    #[test]
    fn concurrent_transfers_never_interleave() {
        const ROUNDS: usize = 200;
        let bus = SharedBus::<CriticalSectionRawMutex, _>::new(RecordingBus::default());

        std::thread::scope(|scope| {
            for address in [0x29u8, 0x30u8] {
                let bus = &bus;
                scope.spawn(move || {
                    let mut device = bus.device("worker");
                    for _ in 0..ROUNDS {
                        let mut block = [0u8; 17];
                        device.write_read(address, &[0x00, 0x89], &mut block).unwrap();
                        assert!(block.iter().all(|&b| b == address));
                    }
                });
            }
        });

        let events = bus.into_inner().events;
        assert_eq!(events.len(), 2 * ROUNDS * 4);
        for transfer in events.chunks(4) {
            let BusEvent::Start(address) = transfer[0] else {
                panic!("transfer does not begin with a start: {:?}", transfer);
            };
            assert_eq!(transfer[1], BusEvent::Write(address, vec![0x00, 0x89]));
            assert_eq!(transfer[2], BusEvent::Read(address, 17));
            assert_eq!(transfer[3], BusEvent::Stop(address));
        }
    }
}
