use std::ffi::{CStr, CString};
use std::os::raw::c_char;

pub(crate) unsafe fn c_ptr_to_string(ptr: *const c_char) -> String {
    CStr::from_ptr(ptr).to_string_lossy().into_owned()
}

/// Returns the names from `wanted` that are present in `available`,
/// or the list of missing names if `required` is set and something is absent.
pub(crate) fn filter_names(
    available: &[String],
    wanted: &[&str],
    required: bool,
) -> Result<Vec<CString>, Vec<String>> {
    let mut missing = vec![];
    let mut found = vec![];

    for &name in wanted {
        if available.iter().any(|v| v == name) {
            // Names are static identifiers without interior NULs.
            if let Ok(name) = CString::new(name) {
                found.push(name);
            }
        } else if required {
            missing.push(name.to_owned());
        }
    }

    if missing.is_empty() {
        Ok(found)
    } else {
        Err(missing)
    }
}

macro_rules! vk_bitflags_impl {
    ($name: ident, $flag_type: ty) => {
        impl $name {
            #[inline]
            pub const fn empty() -> $name {
                $name(<$flag_type>::empty())
            }
            #[inline]
            pub fn contains(&self, other: $name) -> bool {
                self.0.contains(other.0)
            }
        }
        impl std::ops::BitOr for $name {
            type Output = $name;
            #[inline]
            fn bitor(self, rhs: $name) -> $name {
                $name(self.0 | rhs.0)
            }
        }
        impl std::ops::BitOrAssign for $name {
            #[inline]
            fn bitor_assign(&mut self, rhs: $name) {
                self.0 |= rhs.0
            }
        }
    };
}

pub(crate) use vk_bitflags_impl;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_reports_missing_required() {
        let available = vec!["VK_KHR_surface".to_owned(), "VK_KHR_swapchain".to_owned()];

        let found = filter_names(&available, &["VK_KHR_swapchain", "VK_EXT_other"], false).unwrap();
        assert_eq!(found.len(), 1);

        let missing = filter_names(&available, &["VK_KHR_swapchain", "VK_EXT_other"], true).unwrap_err();
        assert_eq!(missing, vec!["VK_EXT_other".to_owned()]);
    }
}
