/// Hashes a string with blake3 and returns the hex digest.
///
/// # Example
///
/// ```
/// use condaview_utils::hash::hash_string;
///
/// let digest = hash_string("https://conda.anaconda.org/conda-forge/channeldata.json");
/// assert_eq!(digest.len(), 64);
/// ```
pub fn hash_string(input: &str) -> String {
    blake3::hash(input.as_bytes()).to_hex().to_string()
}

/// Builds the cache-store key for a URL: `<namespace>:<blake3-hex(url)>`.
pub fn cache_key(namespace: &str, url: &str) -> String {
    format!("{namespace}:{}", hash_string(url))
}
