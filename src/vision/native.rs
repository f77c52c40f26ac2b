use libloading::{Library, Symbol};
use once_cell::sync::OnceCell;
use std::os::raw::c_int;
use std::path::Path;
use std::sync::Arc;

use crate::common::{Frame, Point, Region};
use crate::error::VisionError;
use crate::vision::analyzer::{Analyzer, DetectionResult};

type SubmitFn = unsafe extern "C" fn(*const u8, c_int, c_int) -> c_int;
type DetectedFn = unsafe extern "C" fn() -> bool;
type CoordFn = unsafe extern "C" fn() -> c_int;
type DrawFn = unsafe extern "C" fn(*mut u8, c_int, c_int);

static VISION: OnceCell<Arc<NativeVision>> = OnceCell::new();

/// Binding to the native skystone vision library.
///
/// The library keeps its last computed detection internally: `vision_submit`
/// runs the detector on a packed RGB buffer, the getters read back what it
/// found and `vision_draw` paints it onto another buffer. A running
/// `vision_submit` cannot be interrupted.
pub struct NativeVision {
    // Keeps the function pointers below valid.
    _lib: Library,
    submit_fn: SubmitFn,
    detected_fn: DetectedFn,
    min_x_fn: CoordFn,
    max_x_fn: CoordFn,
    min_y_fn: CoordFn,
    max_y_fn: CoordFn,
    draw_fn: DrawFn,
}

impl NativeVision {
    /// Loads the library once per process. Later calls return the binding
    /// from the first successful call and ignore `path`.
    pub fn init(path: impl AsRef<Path>) -> Result<Arc<Self>, VisionError> {
        VISION
            .get_or_try_init(|| Self::load(path.as_ref()).map(Arc::new))
            .cloned()
    }

    /// Loads the library and caches every symbol the detector needs.
    pub fn load(path: &Path) -> Result<Self, VisionError> {
        // SAFETY: the vision library has no load-time initialisers with
        // preconditions, and every symbol is resolved against the exact C
        // signature it exports.
        unsafe {
            let lib = Library::new(path).map_err(|e| VisionError::Init {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

            let submit_fn = symbol::<SubmitFn>(&lib, "vision_submit")?;
            let detected_fn = symbol::<DetectedFn>(&lib, "vision_detected")?;
            let min_x_fn = symbol::<CoordFn>(&lib, "vision_get_min_x")?;
            let max_x_fn = symbol::<CoordFn>(&lib, "vision_get_max_x")?;
            let min_y_fn = symbol::<CoordFn>(&lib, "vision_get_min_y")?;
            let max_y_fn = symbol::<CoordFn>(&lib, "vision_get_max_y")?;
            let draw_fn = symbol::<DrawFn>(&lib, "vision_draw")?;

            tracing::info!("Loaded vision library from {}", path.display());

            Ok(Self {
                _lib: lib,
                submit_fn,
                detected_fn,
                min_x_fn,
                max_x_fn,
                min_y_fn,
                max_y_fn,
                draw_fn,
            })
        }
    }
}

unsafe fn symbol<T: Copy>(lib: &Library, name: &'static str) -> Result<T, VisionError> {
    let sym: Symbol<T> = lib
        .get(name.as_bytes())
        .map_err(|e| VisionError::MissingSymbol(name, e.to_string()))?;
    Ok(*sym)
}

fn dimensions(frame: &Frame) -> Option<(c_int, c_int)> {
    let width = c_int::try_from(frame.width()).ok()?;
    let height = c_int::try_from(frame.height()).ok()?;
    Some((width, height))
}

impl Analyzer for NativeVision {
    fn analyze(&self, frame: &Frame) -> Result<DetectionResult, VisionError> {
        let (width, height) = dimensions(frame).ok_or(VisionError::AnalysisFailed(-1))?;

        // SAFETY: the buffer is a packed width*height*3 RGB image owned by
        // `frame` for the whole call; the library only reads it.
        let status = unsafe { (self.submit_fn)(frame.image().as_ptr(), width, height) };
        if status < 0 {
            return Err(VisionError::AnalysisFailed(status));
        }

        // SAFETY: plain getters over the library's last result.
        unsafe {
            if !(self.detected_fn)() {
                return Ok(DetectionResult::not_found());
            }
            let min = Point::new((self.min_x_fn)(), (self.min_y_fn)());
            let max = Point::new((self.max_x_fn)(), (self.max_y_fn)());
            Ok(DetectionResult::found(Region::from_corners(min, max)))
        }
    }

    fn annotate(&self, frame: &mut Frame) {
        let Some((width, height)) = dimensions(frame) else {
            tracing::warn!("Frame too large to annotate: {}x{}", frame.width(), frame.height());
            return;
        };
        // SAFETY: the buffer is a packed width*height*3 RGB image exclusively
        // borrowed for the call; the library draws within its bounds.
        unsafe { (self.draw_fn)(frame.image_mut().as_mut_ptr(), width, height) };
    }

    fn name(&self) -> &'static str {
        "native-vision"
    }
}
