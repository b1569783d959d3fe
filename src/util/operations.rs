use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use linux_embedded_hal::sysfs_gpio::PinPoller;
use log::{debug, info, trace, warn};

use radio_sx127x_lora::prelude::*;

use super::gpio::GpioError;
use super::{Radio, RadioError};

/// Radio slot shared with the DIO0 interrupt path
static RADIO: Shared<Radio> = Shared::new();

/// Packets delivered to the receive handler
static RECEIVED: AtomicUsize = AtomicUsize::new(0);

fn log_packet(data: &[u8], rssi: i16, snr: f32) {
    match std::str::from_utf8(data) {
        Ok(s) => info!("Received: '{}' (rssi: {} dBm, snr: {} dB)", s, rssi, snr),
        Err(_) => info!("Received: {:?} (rssi: {} dBm, snr: {} dB)", data, rssi, snr),
    }
}

/// Transmit a packet using the blocking packet interface
pub fn do_transmit(
    radio: &mut Radio,
    data: &[u8],
    power: Option<i8>,
    implicit_header: bool,
    continuous: bool,
    period: Duration,
) -> Result<(), RadioError> {
    if let Some(power) = power {
        let output = radio.config().pa_output;
        radio.set_tx_power(power, output)?;
    }

    loop {
        let n = radio.transmit(data, implicit_header)?;
        debug!("Sent {} bytes", n);

        if !continuous {
            break;
        }
        std::thread::sleep(period);
    }

    Ok(())
}

/// Receive by polling single receive mode
pub fn do_receive(
    radio: &mut Radio,
    buff: &mut [u8],
    size: u8,
    continuous: bool,
    poll_interval: Duration,
) -> Result<usize, RadioError> {
    loop {
        if radio.received_packet(size)? {
            let n = radio.read_payload(buff)?;
            log_packet(&buff[..n], radio.packet_rssi()?, radio.packet_snr()?);

            if !continuous {
                return Ok(n);
            }
        }

        std::thread::sleep(poll_interval);
    }
}

fn on_packet(radio: &mut Radio, data: &[u8]) {
    match (radio.packet_rssi(), radio.packet_snr()) {
        (Ok(rssi), Ok(snr)) => log_packet(data, rssi, snr),
        (Err(e), _) | (_, Err(e)) => warn!("Error fetching packet info: {:?}", e),
    }

    RECEIVED.fetch_add(1, Ordering::SeqCst);
}

/// Receive using the DIO0 interrupt and receive handler
pub fn do_listen(
    radio: Radio,
    mut poller: PinPoller,
    continuous: bool,
    poll_timeout: Duration,
) -> Result<Radio, RadioError> {
    RADIO.install(radio);

    let armed = RADIO.lock(|r| {
        r.on_receive(Some(on_packet))?;
        r.receive(0)
    });
    if let Some(Err(e)) = armed {
        return Err(e);
    }

    let timeout = poll_timeout.as_millis() as isize;

    loop {
        match poller.poll(timeout) {
            Ok(Some(_)) => {
                let handled = RADIO.lock(|r| r.handle_interrupt()).transpose()?;
                trace!("Interrupt handled: {:?}", handled);
            }
            Ok(None) => trace!("Interrupt poll timeout"),
            Err(e) => return Err(Error::Pin(GpioError(e))),
        }

        if !continuous && RECEIVED.load(Ordering::SeqCst) > 0 {
            break;
        }
    }

    let mut radio = RADIO.take().expect("radio missing from shared slot");
    radio.on_receive(None)?;

    Ok(radio)
}

/// Sample the channel RSSI in continuous receive, returning the (min, max) observed
pub fn do_rssi(radio: &mut Radio, continuous: bool, period: Duration) -> Result<(i16, i16), RadioError> {
    radio.receive(0)?;

    let first = radio.rssi()?;
    let (mut min, mut max) = (first, first);
    info!("rssi: {} dBm", first);

    while continuous {
        std::thread::sleep(period);

        // Packets arriving while sampling are discarded
        let irq = radio.irq_flags()?;
        if !irq.is_empty() {
            trace!("Discarding irq: {:?}", irq);
        }

        let rssi = radio.rssi()?;
        min = min.min(rssi);
        max = max.max(rssi);
        info!("rssi: {} dBm (min: {} max: {})", rssi, min, max);
    }

    Ok((min, max))
}

/// Send received packets back to the sender after `delay`
pub fn do_repeat(
    radio: &mut Radio,
    buff: &mut [u8],
    power: Option<i8>,
    continuous: bool,
    delay: Duration,
    poll_interval: Duration,
) -> Result<usize, RadioError> {
    if let Some(power) = power {
        let output = radio.config().pa_output;
        radio.set_tx_power(power, output)?;
    }

    let mut repeated = 0usize;

    loop {
        // Re-arms single receive after each transmit
        if !radio.received_packet(0)? {
            std::thread::sleep(poll_interval);
            continue;
        }

        let n = radio.read_payload(buff)?;
        log_packet(&buff[..n], radio.packet_rssi()?, radio.packet_snr()?);

        std::thread::sleep(delay);

        // Bounded by the configured transmit timeout
        radio.transmit(&buff[..n], false)?;
        repeated += 1;
        debug!("Repeated {} bytes ({} packets)", n, repeated);

        if !continuous {
            return Ok(n);
        }
    }
}
