use std::env;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{bail, Context};
use linux_embedded_hal::spidev::{SpiModeFlags, SpidevOptions};
use linux_embedded_hal::sysfs_gpio::Direction;
use linux_embedded_hal::{Delay, Spidev, SysfsPin};

use arduchip::{ArduChip, PollOptions, MAX_FRAMEBUFFER_SIZE};

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() != 4 {
        bail!("Three arguments required: <SPI device> <chip-select GPIO> <output file>");
    }
    let mut spi = Spidev::open(Path::new(&args[1]))
        .with_context(|| format!("{} should be an SPI device", args[1]))?;
    let options = SpidevOptions::new()
        .bits_per_word(8)
        .max_speed_hz(4_000_000)
        .mode(SpiModeFlags::SPI_MODE_0 | SpiModeFlags::SPI_NO_CS)
        .build();
    spi.configure(&options).context("configuring the SPI device")?;

    let gpio: u64 = args[2].parse().context("The GPIO should be a number")?;
    let chip_select = SysfsPin::new(gpio);
    chip_select.export().context("exporting the chip-select GPIO")?;
    // Start out high (deselected) so the camera doesn't see a spurious transaction.
    chip_select
        .set_direction(Direction::High)
        .context("setting the chip-select GPIO as an output")?;

    let mut camera = ArduChip::new(spi, chip_select)?;
    camera.probe()?;
    println!(
        "ArduChip version {:#04x}, made in {}",
        camera.version()?,
        camera.manufacture_year()?
    );

    let mut framebuffer = vec![0u8; MAX_FRAMEBUFFER_SIZE];
    // Give the camera up to 5 seconds to finish the capture.
    let poll = PollOptions::every(1000).with_max_polls(5000);
    let length = camera.read_image_with_delay(&mut framebuffer, &mut Delay, &poll)?;
    if length == 0 {
        bail!("The camera did not produce an image");
    }
    let mut output =
        File::create(&args[3]).with_context(|| format!("creating {}", args[3]))?;
    output.write_all(&framebuffer[..length])?;
    println!("Wrote {} bytes to {}", length, args[3]);

    let (_spi, chip_select) = camera.release();
    chip_select.unexport()?;
    Ok(())
}
