use plotters::{coord::Shift, prelude::*};

use super::base::RgbFrame;

pub type DrawResult = Result<(), Box<dyn std::error::Error>>;

/// Draws a frame into an in-memory RGB buffer.
///
/// Drawing failures are logged and give `None`, so a broken renderer
/// never interrupts an episode.
pub fn render_frame<F>(width: u32, height: u32, draw: F) -> Option<RgbFrame>
where
    F: FnOnce(&DrawingArea<BitMapBackend<'_>, Shift>) -> DrawResult,
{
    let mut data = vec![0u8; (width * height * 3) as usize];

    let res = {
        let root = BitMapBackend::with_buffer(&mut data, (width, height)).into_drawing_area();
        draw(&root).and_then(|_| {
            root.present()
                .map_err(|e| Box::new(e) as Box<dyn std::error::Error>)
        })
    };

    match res {
        Ok(()) => Some(RgbFrame {
            width,
            height,
            data,
        }),
        Err(e) => {
            tracing::warn!("failed to render frame: {e}");
            None
        }
    }
}

#[cfg(test)]
mod test {
    use plotters::prelude::*;

    use super::render_frame;

    #[test]
    fn fills_buffer() {
        let frame = render_frame(4, 2, |root| {
            root.fill(&RED)?;
            Ok(())
        })
        .unwrap();

        assert_eq!(frame.data.len(), 4 * 2 * 3);
        assert_eq!(&frame.data[..3], &[255, 0, 0]);
    }
}
