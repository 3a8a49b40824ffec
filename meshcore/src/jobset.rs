use crate::helpe::*;

/// The jobs an allocator will be offered, in arrival order.
pub type JobStream = Vec<Arc<Job>>;

/// Initializes a [JobStream] with a given set of jobs.
/// A successfully returned stream is guaranteed to be
/// compliant with all of `meshcore`'s assumptions. These are:
/// - no job asks for zero processors
/// - no two jobs share an ID
///
/// This function is the gatekeeper to the rest of the library.
pub fn init(mut in_elts: Vec<Job>) -> Result<JobStream, JobError> {
    let mut seen = HashSet::new();
    for idx in 0..in_elts.len() {
        let j = &in_elts[idx];
        if j.procs_needed == 0 {
            return Err(JobError {
                message: String::from("Job asking for 0 processors found!"),
                culprit: in_elts.remove(idx),
            });
        } else if !seen.insert(j.id) {
            return Err(JobError {
                message: String::from("Duplicate job ID found!"),
                culprit: in_elts.remove(idx),
            });
        }
    }

    Ok(in_elts
        .into_iter()
        .map(Arc::new)
        .collect())
}

/// Reads and validates a job list in one go.
pub fn read_from_path<T, B>(file_path: PathBuf) -> Result<JobStream, Box<dyn std::error::Error + Send + Sync>>
where T: JobGen<B> {
    let parser = T::new(file_path);
    let jobs = parser.read_jobs()?;
    let stream = init(jobs)?;

    Ok(stream)
}

#[inline(always)]
pub fn get_max_procs(jobs: &JobStream) -> usize {
    jobs.iter()
        .map(|j| j.procs_needed)
        .max()
        .unwrap_or(0)
}
