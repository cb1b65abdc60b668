/// Substitutes `{name}` placeholders in a server-supplied URI template.
///
/// Placeholders without a matching parameter are left untouched, so a
/// template can be filled in several passes (e.g. a child id first, a
/// chunk offset later).
///
/// # Arguments
///
/// * `template` - The URI template, e.g. `/source/1/bytes/{seq_num}/{byte_offset}`
/// * `params` - Name/value pairs to substitute
///
/// # Returns
///
/// The expanded URI.
pub fn expand_template<K, V>(template: &str, params: &[(K, V)]) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    params.iter().fold(template.to_string(), |uri, (name, value)| {
        uri.replace(&format!("{{{}}}", name.as_ref()), value.as_ref())
    })
}
