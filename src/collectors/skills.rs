/// Job skills that correspond to any configured skill.
///
/// Both sides are trimmed and lowercased, then a job skill matches when
/// either string contains the other. This accepts truncated names ("java"
/// vs "javascript") and compound phrasing ("node.js developer" vs "node.js"),
/// and will also match some short tokens loosely. Returned values keep the
/// job's original spelling and order.
pub fn match_skills(job_skills: &[String], configured: &[String]) -> Vec<String> {
    if job_skills.is_empty() || configured.is_empty() {
        return Vec::new();
    }

    let wanted: Vec<String> = configured
        .iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();

    job_skills
        .iter()
        .filter(|skill| {
            let skill = skill.trim().to_lowercase();
            !skill.is_empty()
                && wanted
                    .iter()
                    .any(|w| skill.contains(w.as_str()) || w.contains(skill.as_str()))
        })
        .cloned()
        .collect()
}
