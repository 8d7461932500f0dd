use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use rstsr_so_ccsd::prelude::*;
use rstsr_so_ccsd::util::{ccsd_info_from_npy, tensor_from_npy};

#[derive(Parser, Debug)]
#[clap(version, about, long_about = None)]
struct CliParser {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct CliArgsIntegrals {
    #[clap(short, long = "fock", help = "Path to the npy file of the spin-orbital Fock matrix")]
    fock_file: String,

    #[clap(short, long = "eri", help = "Path to the npy file of antisymmetrized integrals <pq||rs>")]
    eri_file: String,

    #[clap(short, long = "nocc", help = "Number of occupied spin-orbitals")]
    nocc: usize,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Guess {
    /// Zero amplitudes.
    Zero,
    /// First-order (MP2) amplitudes.
    Mp2,
}

#[derive(Args, Debug)]
struct CliArgsCCSD {
    #[clap(flatten)]
    integrals: CliArgsIntegrals,

    #[clap(long = "mo-energy", help = "Path to the npy file of orbital energies (default: Fock diagonal)")]
    mo_energy_file: Option<String>,

    #[clap(long, default_value_t = 100, help = "Maximum number of iterations")]
    max_iter: usize,

    #[clap(long, default_value_t = 1.0e-12, help = "Convergence threshold on the energy change")]
    stopping_eps: f64,

    #[clap(long, help = "DIIS history size (DIIS is disabled if not given)")]
    diis_size: Option<usize>,

    #[clap(long, default_value_t = 4, help = "Number of iterations before DIIS extrapolation starts")]
    diis_start_cycle: usize,

    #[clap(long, value_enum, default_value_t = Guess::Zero, help = "Initial amplitudes")]
    guess: Guess,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[clap(name = "ccsd", about = "Run a spin-orbital CCSD calculation")]
    Ccsd(CliArgsCCSD),

    #[clap(name = "reference", about = "Evaluate the reference determinant energy")]
    Reference(CliArgsIntegrals),
}

fn run_ccsd(args: CliArgsCCSD) -> anyhow::Result<()> {
    let time = std::time::Instant::now();
    let integrals = &args.integrals;
    let ccsd_info = ccsd_info_from_npy(&integrals.fock_file, &integrals.eri_file, integrals.nocc)
        .context("failed to load integrals")?;

    let denom = match &args.mo_energy_file {
        Some(file) => {
            let mo_energy = tensor_from_npy(file).with_context(|| format!("failed to load {file}"))?;
            Denominators::from_orbital_energies(&mo_energy, &ccsd_info.space)?
        },
        None => Denominators::from_fock_diagonal(&ccsd_info.fock, &ccsd_info.space)?,
    };

    let (t1, t2) = match args.guess {
        Guess::Zero => AmplitudeLayout::new(&ccsd_info.space).zeros(ccsd_info.fock.device()),
        Guess::Mp2 => get_ccsd_initial_guess(&ccsd_info, &denom)?,
    };

    let cc_config = CCSDConfig {
        max_iter: args.max_iter,
        stopping_eps: args.stopping_eps,
        diis_size: args.diis_size,
        diis_start_cycle: args.diis_start_cycle,
    };
    let e_ref = get_reference_energy(&ccsd_info.fock, &ccsd_info.eri, &ccsd_info.space)?;
    let ccsd_results = ccsd_kernel(&ccsd_info, &denom, t1, t2, &cc_config)?;

    println!("Reference Energy: {e_ref:.15}");
    println!("CCSD Total Energy: {:.15}", ccsd_results.energy);
    println!("CCSD Corr Energy: {:.15}", ccsd_results.energy - e_ref);
    println!("T1 Diagnostic: {:.6}", t1_diagnostic(&ccsd_results.t1));
    println!("Elapsed time for CCSD: {:.2?}", time.elapsed());

    if ccsd_results.status == CCSDStatus::Exhausted {
        bail!("CCSD did not converge in {} iterations", ccsd_results.niter);
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = CliParser::parse();

    match args.command {
        Command::Ccsd(cli_args) => run_ccsd(cli_args)?,
        Command::Reference(cli_args) => {
            let ccsd_info = ccsd_info_from_npy(&cli_args.fock_file, &cli_args.eri_file, cli_args.nocc)
                .context("failed to load integrals")?;
            let e_ref = get_reference_energy(&ccsd_info.fock, &ccsd_info.eri, &ccsd_info.space)?;
            println!("Reference Energy: {e_ref:.15}");
        },
    }
    Ok(())
}
