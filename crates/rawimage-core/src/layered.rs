use crate::{Enforcer, ImageDType, ImageError, ImageView};

/// Co-registered signal, variance and mask bands of one scene.
///
/// All three bands share width and height. Signal and variance share an element type; the
/// mask usually carries a narrower one (bit planes, flags). Bands keep whatever storage they
/// were built with, borrowed or owned.
#[derive(Debug)]
pub struct LayeredImage<'a, S: ImageDType, M: ImageDType> {
    signal: ImageView<'a, S>,
    variance: ImageView<'a, S>,
    mask: ImageView<'a, M>,
}

impl<'a, S: ImageDType, M: ImageDType> LayeredImage<'a, S, M> {
    pub fn new(
        signal: ImageView<'a, S>,
        variance: ImageView<'a, S>,
        mask: ImageView<'a, M>,
    ) -> Result<Self, ImageError> {
        let dims = Enforcer::match_band_shapes(&[
            ("signal", signal.dims()),
            ("variance", variance.dims()),
            ("mask", mask.dims()),
        ])?;
        log::debug!(
            "Layered image {}x{} ({}/{}, borrowed: {}/{}/{})",
            dims[0],
            dims[1],
            S::dt(),
            M::dt(),
            signal.is_borrowed(),
            variance.is_borrowed(),
            mask.is_borrowed()
        );
        Ok(Self {
            signal,
            variance,
            mask,
        })
    }

    pub fn zeros(height: usize, width: usize) -> Result<LayeredImage<'static, S, M>, ImageError> {
        LayeredImage::new(
            ImageView::zeros(height, width)?,
            ImageView::zeros(height, width)?,
            ImageView::zeros(height, width)?,
        )
    }

    pub fn signal(&self) -> &ImageView<'a, S> {
        &self.signal
    }

    pub fn variance(&self) -> &ImageView<'a, S> {
        &self.variance
    }

    pub fn mask(&self) -> &ImageView<'a, M> {
        &self.mask
    }

    pub fn signal_mut(&mut self) -> &mut ImageView<'a, S> {
        &mut self.signal
    }

    pub fn variance_mut(&mut self) -> &mut ImageView<'a, S> {
        &mut self.variance
    }

    pub fn mask_mut(&mut self) -> &mut ImageView<'a, M> {
        &mut self.mask
    }

    pub fn into_parts(self) -> (ImageView<'a, S>, ImageView<'a, S>, ImageView<'a, M>) {
        (self.signal, self.variance, self.mask)
    }

    pub fn width(&self) -> usize {
        self.signal.width()
    }

    pub fn height(&self) -> usize {
        self.signal.height()
    }
}

impl<'a, S: ImageDType, M: ImageDType> std::fmt::Display for LayeredImage<'a, S, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "signal:\n{}", self.signal)?;
        writeln!(f, "variance:\n{}", self.variance)?;
        write!(f, "mask:\n{}", self.mask)
    }
}
