use std::{fs, io::BufWriter, path::Path};

use tracing::info;

use crate::Figure;

/// Consumes a finished figure. Drawing backends implement this; the crate
/// itself only records figures or writes them out as JSON.
pub trait Renderer {
    fn render(&mut self, figure: &Figure) -> Result<(), crate::Error>;
}

/// Keeps every figure it is given.
impl Renderer for Vec<Figure> {
    fn render(&mut self, figure: &Figure) -> Result<(), crate::Error> {
        self.push(figure.clone());
        Ok(())
    }
}

impl<R: Renderer + ?Sized> Renderer for &mut R {
    fn render(&mut self, figure: &Figure) -> Result<(), crate::Error> {
        (**self).render(figure)
    }
}

/// Writes the figure description as JSON.
pub struct JsonRenderer<W> {
    writer: W,
    pretty: bool,
}

impl JsonRenderer<BufWriter<fs::File>> {
    /// Writes to a new file at `path`, one figure per line.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, crate::Error> {
        let path = path.as_ref();
        info!("Writing figures to {}", path.display());
        Ok(Self::new(BufWriter::new(fs::File::create(path)?)))
    }
}

impl<W: std::io::Write> JsonRenderer<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            pretty: false,
        }
    }

    pub fn pretty(mut self) -> Self {
        self.pretty = true;
        self
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: std::io::Write> Renderer for JsonRenderer<W> {
    fn render(&mut self, figure: &Figure) -> Result<(), crate::Error> {
        if self.pretty {
            serde_json::to_writer_pretty(&mut self.writer, figure)?;
        } else {
            serde_json::to_writer(&mut self.writer, figure)?;
        }
        std::io::Write::write_all(&mut self.writer, b"\n")?;
        std::io::Write::flush(&mut self.writer)?;
        Ok(())
    }
}
