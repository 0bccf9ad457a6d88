use crate::descriptor::MetadataDescriptor;

/// Expected byte size of everything the descriptors describe.
///
/// Pass a single descriptor as `[&d]` or `std::iter::once(&d)`.
pub fn estimate_size<'a, I>(descriptors: I) -> u64
where
    I: IntoIterator<Item = &'a MetadataDescriptor>,
{
    descriptors.into_iter().map(descriptor_size).sum()
}

/// Size of one descriptor: its declared `filesize`, else the sum of the
/// `formats` entries named by each `+`-separated component of `format_id`.
pub fn descriptor_size(descriptor: &MetadataDescriptor) -> u64 {
    if let Some(size) = descriptor.filesize {
        return size;
    }
    let Some(format_id) = descriptor.format_id.as_deref() else {
        return 0;
    };

    format_id
        .split('+')
        .map(|component| {
            descriptor
                .formats()
                .iter()
                .filter(|f| f.format_id.as_deref() == Some(component))
                .filter_map(|f| f.filesize)
                .sum::<u64>()
        })
        .sum()
}
