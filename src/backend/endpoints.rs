//! Backend route construction
//!
//! Every upload route lives under `{base_url}/{language}/media/create_or_update/s3auth/`.
//! Dynamic segments are percent-encoded; object keys keep their `/` separators.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Characters escaped inside a single path segment
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Same as [`SEGMENT`] but `/` passes through, for object keys
const KEY_PATH: &AsciiSet = &SEGMENT.remove(b'/');

fn encode_segment(value: &str) -> String {
    utf8_percent_encode(value, SEGMENT).to_string()
}

fn encode_key(value: &str) -> String {
    utf8_percent_encode(value, KEY_PATH).to_string()
}

/// URL builder for the backend routes
#[derive(Debug, Clone)]
pub struct Endpoints {
    base_url: String,
    language: String,
}

impl Endpoints {
    pub fn new(base_url: &str, language: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            language: language.trim_matches('/').to_string(),
        }
    }

    fn s3auth(&self) -> String {
        format!(
            "{}/{}/media/create_or_update/s3auth",
            self.base_url, self.language
        )
    }

    /// `GET get_data_for_upload/{filename}/`
    pub fn session(&self, filename: &str) -> String {
        format!(
            "{}/get_data_for_upload/{}/",
            self.s3auth(),
            encode_segment(filename)
        )
    }

    /// `GET get_upload_part_presigned_url/{upload_id}/{part_number}/{file_key}/`
    pub fn presign_part(&self, upload_id: &str, part_number: u32, file_key: &str) -> String {
        format!(
            "{}/get_upload_part_presigned_url/{}/{}/{}/",
            self.s3auth(),
            encode_segment(upload_id),
            part_number,
            encode_key(file_key)
        )
    }

    /// `POST do_complete/{upload_id}/{file_key}/`
    pub fn complete(&self, upload_id: &str, file_key: &str) -> String {
        format!(
            "{}/do_complete/{}/{}/",
            self.s3auth(),
            encode_segment(upload_id),
            encode_key(file_key)
        )
    }

    /// `POST do_abort/{upload_id}/{file_key}/`
    pub fn abort(&self, upload_id: &str, file_key: &str) -> String {
        format!(
            "{}/do_abort/{}/{}/",
            self.s3auth(),
            encode_segment(upload_id),
            encode_key(file_key)
        )
    }

    /// `GET s3auth/` (the file name goes in the `file_name` query parameter)
    pub fn direct_form(&self) -> String {
        format!("{}/", self.s3auth())
    }

    /// Resolve a page path such as `/en-us/media/view/12/` against the base URL.
    /// Absolute URLs are returned unchanged.
    pub fn page(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}
