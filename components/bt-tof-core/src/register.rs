use embedded_hal::i2c::{I2c, SevenBitAddress};
use heapless::Vec;

/// Largest payload a single [`RegisterBus::write_bytes`] call can carry.
pub const MAX_PAYLOAD_LEN: usize = 96;

const REGISTER_ADDRESS_LEN: usize = 2;

#[derive(Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusError<E> {
    /// The underlying bus failed (NACK, arbitration loss, timeout, ...).
    Transfer(E),
    PayloadTooLong { len: usize, max: usize },
}

impl<E: core::fmt::Debug> core::fmt::Display for BusError<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl<E> From<E> for BusError<E> {
    fn from(error: E) -> Self {
        BusError::Transfer(error)
    }
}

/// Register access for devices with a 16-bit, big-endian register address
/// space. Each call is exactly one bus transfer.
pub struct RegisterBus<I2C> {
    i2c: I2C,
    address: SevenBitAddress,
}

impl<I2C, E> RegisterBus<I2C>
where
    I2C: I2c<Error = E>,
{
    pub fn new(i2c: I2C, address: SevenBitAddress) -> Self {
        Self { i2c, address }
    }

    pub fn address(&self) -> SevenBitAddress {
        self.address
    }

    pub fn release(self) -> I2C {
        self.i2c
    }

    /// Fills `buffer` with consecutive registers starting at `register`.
    pub fn read_bytes<R>(&mut self, register: R, buffer: &mut [u8]) -> Result<(), BusError<E>>
    where
        R: Into<u16>,
    {
        let register: u16 = register.into();
        self.i2c.write_read(self.address, &register.to_be_bytes(), buffer)?;
        trace!("Reg[{:02X}]> read {} bytes at {:04X}", self.address, buffer.len(), register);
        Ok(())
    }

    pub fn read_array<const N: usize, R>(&mut self, register: R) -> Result<[u8; N], BusError<E>>
    where
        R: Into<u16>,
    {
        let mut buffer = [0u8; N];
        self.read_bytes(register, &mut buffer)?;
        Ok(buffer)
    }

    /// Writes `payload` to consecutive registers starting at `register` as a
    /// single contiguous transfer.
    pub fn write_bytes<R>(&mut self, register: R, payload: &[u8]) -> Result<(), BusError<E>>
    where
        R: Into<u16>,
    {
        let register: u16 = register.into();
        let too_long = || BusError::PayloadTooLong {
            len: payload.len(),
            max: MAX_PAYLOAD_LEN,
        };
        let mut frame: Vec<u8, { REGISTER_ADDRESS_LEN + MAX_PAYLOAD_LEN }> =
            Vec::from_slice(&register.to_be_bytes()).map_err(|_| too_long())?;
        frame.extend_from_slice(payload).map_err(|_| too_long())?;
        self.i2c.write(self.address, &frame)?;
        trace!("Reg[{:02X}]> wrote {} bytes at {:04X}", self.address, payload.len(), register);
        Ok(())
    }

    pub fn read_u8<R>(&mut self, register: R) -> Result<u8, BusError<E>>
    where
        R: Into<u16>,
    {
        let [value] = self.read_array::<1, R>(register)?;
        Ok(value)
    }

    pub fn read_u16<R>(&mut self, register: R) -> Result<u16, BusError<E>>
    where
        R: Into<u16>,
    {
        Ok(u16::from_be_bytes(self.read_array::<2, R>(register)?))
    }

    pub fn write_u8<R>(&mut self, register: R, value: u8) -> Result<(), BusError<E>>
    where
        R: Into<u16>,
    {
        self.write_bytes(register, &[value])
    }

    pub fn write_u16<R>(&mut self, register: R, value: u16) -> Result<(), BusError<E>>
    where
        R: Into<u16>,
    {
        self.write_bytes(register, &value.to_be_bytes())
    }
}

#[cfg(test)]
pub mod tests {
    use embedded_hal::i2c::ErrorKind;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};

    use super::*;

    const ADDRESS: u8 = 0x29;

    #[test]
    fn read_u16_is_big_endian() {
        let expectations = [I2cTransaction::write_read(ADDRESS, vec![0x01, 0x0F], vec![0xEA, 0xCC])];
        let mut mock = I2cMock::new(&expectations);
        let mut registers = RegisterBus::new(mock.clone(), ADDRESS);

        assert_eq!(registers.read_u16(0x010Fu16).unwrap(), 0xEACC);
        mock.done();
    }

    #[test]
    fn read_u8_single_byte() {
        let expectations = [I2cTransaction::write_read(ADDRESS, vec![0x00, 0xE5], vec![0x03])];
        let mut mock = I2cMock::new(&expectations);
        let mut registers = RegisterBus::new(mock.clone(), ADDRESS);

        assert_eq!(registers.read_u8(0x00E5u16).unwrap(), 0x03);
        mock.done();
    }

    #[test]
    fn write_u16_sends_address_then_value() {
        let expectations = [
            I2cTransaction::write(ADDRESS, vec![0x00, 0x1E, 0x48, 0xD0]),
            I2cTransaction::write(ADDRESS, vec![0x00, 0x00, 0x01]),
        ];
        let mut mock = I2cMock::new(&expectations);
        let mut registers = RegisterBus::new(mock.clone(), ADDRESS);

        registers.write_u16(0x001Eu16, 0x48D0).unwrap();
        registers.write_u8(0x0000u16, 0x01).unwrap();
        mock.done();
    }

    #[test]
    fn read_bytes_is_one_transfer() {
        let block: std::vec::Vec<u8> = (0u8..17).collect();
        let expectations = [I2cTransaction::write_read(ADDRESS, vec![0x00, 0x89], block.clone())];
        let mut mock = I2cMock::new(&expectations);
        let mut registers = RegisterBus::new(mock.clone(), ADDRESS);

        let read: [u8; 17] = registers.read_array(0x0089u16).unwrap();
        assert_eq!(read.as_slice(), block.as_slice());
        mock.done();
    }

    #[test]
    fn write_bytes_is_one_contiguous_transfer() {
        let payload = [0xAAu8; MAX_PAYLOAD_LEN];
        let mut frame = vec![0x00, 0x2D];
        frame.extend_from_slice(&payload);
        let expectations = [I2cTransaction::write(ADDRESS, frame)];
        let mut mock = I2cMock::new(&expectations);
        let mut registers = RegisterBus::new(mock.clone(), ADDRESS);

        registers.write_bytes(0x002Du16, &payload).unwrap();
        mock.done();
    }

    #[test]
    fn oversized_payload_never_reaches_the_bus() {
        let mut mock = I2cMock::new(&[]);
        let mut registers = RegisterBus::new(mock.clone(), ADDRESS);

        let result = registers.write_bytes(0x002Du16, &[0u8; MAX_PAYLOAD_LEN + 1]);
        assert_eq!(
            result,
            Err(BusError::PayloadTooLong {
                len: MAX_PAYLOAD_LEN + 1,
                max: MAX_PAYLOAD_LEN
            })
        );
        mock.done();
    }

    #[test]
    fn transfer_error_is_wrapped() {
        let expectations = [I2cTransaction::write_read(ADDRESS, vec![0x01, 0x0F], vec![0x00, 0x00]).with_error(ErrorKind::Other)];
        let mut mock = I2cMock::new(&expectations);
        let mut registers = RegisterBus::new(mock.clone(), ADDRESS);

        assert_eq!(registers.read_u16(0x010Fu16), Err(BusError::Transfer(ErrorKind::Other)));
        mock.done();
    }
}
