//! AVIF decoding for in-memory sources.
//!
//! The `image` crate's `"avif"` feature only enables the **encoder**
//! (rav1e); decoding would require `"avif-native"` and the C library dav1d.
//! Instead this module pairs `avif-parse` (container) with `rav1d` (pure
//! Rust dav1d port) and converts the decoded YUV planes to RGB8 itself
//! (BT.601 coefficients).
//!
//! Both entry points take the raw file bytes — queue items never touch the
//! filesystem.

use image::DynamicImage;
use rav1d::include::dav1d::data::Dav1dData;
use rav1d::include::dav1d::dav1d::Dav1dSettings;
use rav1d::include::dav1d::headers::{
    DAV1D_PIXEL_LAYOUT_I400, DAV1D_PIXEL_LAYOUT_I420, DAV1D_PIXEL_LAYOUT_I422,
    DAV1D_PIXEL_LAYOUT_I444,
};
use rav1d::include::dav1d::picture::Dav1dPicture;
use std::io::Cursor;
use std::ptr::NonNull;

/// Read pixel dimensions from the container metadata, without a full decode.
pub fn probe_dimensions(bytes: &[u8]) -> Result<(u32, u32), String> {
    let avif = avif_parse::read_avif(&mut Cursor::new(bytes))
        .map_err(|e| format!("Failed to parse AVIF container: {e:?}"))?;
    let meta = avif
        .primary_item_metadata()
        .map_err(|e| format!("Failed to read AVIF metadata: {e:?}"))?;
    Ok((meta.max_frame_width.get(), meta.max_frame_height.get()))
}

/// Decode an AVIF payload to an RGB8 image.
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, String> {
    let avif = avif_parse::read_avif(&mut Cursor::new(bytes))
        .map_err(|e| format!("Failed to parse AVIF container: {e:?}"))?;
    let (width, height, rgb) = decode_av1_payload(&avif.primary_item)?;

    image::RgbImage::from_raw(width, height, rgb)
        .map(DynamicImage::ImageRgb8)
        .ok_or_else(|| "Decoded AVIF plane size mismatch".to_string())
}

/// Run the AV1 payload through rav1d and return interleaved RGB8.
fn decode_av1_payload(av1_bytes: &[u8]) -> Result<(u32, u32, Vec<u8>), String> {
    let mut settings = std::mem::MaybeUninit::<Dav1dSettings>::uninit();
    unsafe {
        rav1d::src::lib::dav1d_default_settings(NonNull::new(settings.as_mut_ptr()).unwrap())
    };
    let mut settings = unsafe { settings.assume_init() };
    // One still image, one thread: keep the decoder footprint minimal.
    settings.n_threads = 1;
    settings.max_frame_delay = 1;

    let mut ctx = None;
    let rc =
        unsafe { rav1d::src::lib::dav1d_open(NonNull::new(&mut ctx), NonNull::new(&mut settings)) };
    if rc.0 != 0 {
        return Err(format!("AV1 decoder open failed ({})", rc.0));
    }

    let mut data = Dav1dData::default();
    let buf_ptr =
        unsafe { rav1d::src::lib::dav1d_data_create(NonNull::new(&mut data), av1_bytes.len()) };
    if buf_ptr.is_null() {
        unsafe { rav1d::src::lib::dav1d_close(NonNull::new(&mut ctx)) };
        return Err("AV1 decoder buffer allocation failed".into());
    }
    unsafe { std::ptr::copy_nonoverlapping(av1_bytes.as_ptr(), buf_ptr, av1_bytes.len()) };

    let rc = unsafe { rav1d::src::lib::dav1d_send_data(ctx, NonNull::new(&mut data)) };
    if rc.0 != 0 {
        unsafe {
            rav1d::src::lib::dav1d_data_unref(NonNull::new(&mut data));
            rav1d::src::lib::dav1d_close(NonNull::new(&mut ctx));
        }
        return Err(format!("AV1 decoder rejected payload ({})", rc.0));
    }

    let mut pic: Dav1dPicture = unsafe { std::mem::zeroed() };
    let rc = unsafe { rav1d::src::lib::dav1d_get_picture(ctx, NonNull::new(&mut pic)) };
    if rc.0 != 0 {
        unsafe { rav1d::src::lib::dav1d_close(NonNull::new(&mut ctx)) };
        return Err(format!("AV1 decode produced no picture ({})", rc.0));
    }

    let result = picture_to_rgb(&pic);

    unsafe {
        rav1d::src::lib::dav1d_picture_unref(NonNull::new(&mut pic));
        rav1d::src::lib::dav1d_close(NonNull::new(&mut ctx));
    }

    result
}

/// Interpret the picture's plane layout and convert to RGB8.
fn picture_to_rgb(pic: &Dav1dPicture) -> Result<(u32, u32, Vec<u8>), String> {
    let width = pic.p.w as u32;
    let height = pic.p.h as u32;
    let bpc = pic.p.bpc as u32;
    let layout = pic.p.layout;
    let y_ptr = pic.data[0].ok_or("Missing luma plane")?.as_ptr() as *const u8;

    let planes = if layout == DAV1D_PIXEL_LAYOUT_I400 {
        Planes {
            y_ptr,
            u_ptr: y_ptr,
            v_ptr: y_ptr,
            y_stride: pic.stride[0],
            uv_stride: 0,
            bpc,
            ss_x: false,
            ss_y: false,
            monochrome: true,
        }
    } else {
        let (ss_x, ss_y) = match layout {
            DAV1D_PIXEL_LAYOUT_I420 => (true, true),
            DAV1D_PIXEL_LAYOUT_I422 => (true, false),
            DAV1D_PIXEL_LAYOUT_I444 => (false, false),
            _ => return Err(format!("Unsupported AVIF pixel layout: {layout}")),
        };
        Planes {
            y_ptr,
            u_ptr: pic.data[1].ok_or("Missing Cb plane")?.as_ptr() as *const u8,
            v_ptr: pic.data[2].ok_or("Missing Cr plane")?.as_ptr() as *const u8,
            y_stride: pic.stride[0],
            uv_stride: pic.stride[1],
            bpc,
            ss_x,
            ss_y,
            monochrome: false,
        }
    };

    Ok((width, height, planes.to_rgb(width, height)))
}

/// Decoded YUV plane pointers plus the layout needed to sample them.
struct Planes {
    y_ptr: *const u8,
    u_ptr: *const u8,
    v_ptr: *const u8,
    y_stride: isize,
    uv_stride: isize,
    bpc: u32,
    /// Chroma subsampling: horizontal, vertical (I420 = true, true).
    ss_x: bool,
    ss_y: bool,
    monochrome: bool,
}

impl Planes {
    /// BT.601 YCbCr → interleaved RGB8, scaling 10/12-bit sources to 8-bit.
    fn to_rgb(&self, width: u32, height: u32) -> Vec<u8> {
        let max_val = ((1u32 << self.bpc) - 1) as f32;
        let center = (1u32 << (self.bpc - 1)) as f32;
        let scale = 255.0 / max_val;

        let mut rgb = vec![0u8; (width * height * 3) as usize];

        for row in 0..height {
            for col in 0..width {
                let y = sample(self.y_ptr, self.y_stride, col, row, self.bpc);

                let (r, g, b) = if self.monochrome {
                    let v = (y * scale).clamp(0.0, 255.0);
                    (v, v, v)
                } else {
                    let u_col = if self.ss_x { col / 2 } else { col };
                    let u_row = if self.ss_y { row / 2 } else { row };
                    let cb = sample(self.u_ptr, self.uv_stride, u_col, u_row, self.bpc) - center;
                    let cr = sample(self.v_ptr, self.uv_stride, u_col, u_row, self.bpc) - center;

                    (
                        ((y + 1.402 * cr) * scale).clamp(0.0, 255.0),
                        ((y - 0.344136 * cb - 0.714136 * cr) * scale).clamp(0.0, 255.0),
                        ((y + 1.772 * cb) * scale).clamp(0.0, 255.0),
                    )
                };

                let idx = ((row * width + col) * 3) as usize;
                rgb[idx] = r as u8;
                rgb[idx + 1] = g as u8;
                rgb[idx + 2] = b as u8;
            }
        }

        rgb
    }
}

/// Read one plane value, handling both 8-bit and 16-bit (10/12 bpc) storage.
#[inline]
fn sample(ptr: *const u8, stride: isize, x: u32, y: u32, bpc: u32) -> f32 {
    if bpc <= 8 {
        (unsafe { *ptr.offset(y as isize * stride + x as isize) }) as f32
    } else {
        let byte_offset = y as isize * stride + x as isize * 2;
        (unsafe { *(ptr.offset(byte_offset) as *const u16) }) as f32
    }
}
